use crate::model::{Classification, Finding, ScanReport};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Location")]
    location: String,
}

pub fn print_text(report: &ScanReport) -> Result<()> {
    for line in text_lines(report) {
        println!("{}", line);
    }
    Ok(())
}

/// Warnings first, then alerts, then the verdict.
fn text_lines(report: &ScanReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .warnings()
        .chain(report.alerts())
        .map(finding_line)
        .collect();
    lines.push(verdict(report));
    lines
}

fn finding_line(finding: &Finding) -> String {
    let (label, detail) = match finding.classification {
        Classification::Warn => (
            "⚠️  WARNING",
            "package was targeted in past attack, but version is not flagged as malicious",
        ),
        Classification::Bad => ("❌ ALERT", "known malicious version"),
    };
    format!(
        "{}: {}@{} in {} ({}) - {}",
        label, finding.package, finding.version, finding.file, finding.location, detail
    )
}

fn verdict(report: &ScanReport) -> String {
    match report.alerts().count() {
        0 => "✅ No known malicious versions detected.".to_string(),
        n => format!("❌ {} known malicious version(s) detected.", n),
    }
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    println!();
    println!(
        "Scan completed at: {}",
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if report.files_scanned.is_empty() {
        println!("No manifests found.");
    } else {
        println!("Scanned: {}", report.files_scanned.join(", "));
    }
    println!();

    if !report.findings.is_empty() {
        let rows: Vec<FindingRow> = report
            .warnings()
            .chain(report.alerts())
            .map(|f| FindingRow {
                status: format_classification(f.classification),
                package: truncate(&f.package, 40),
                version: f.version.clone(),
                file: f.file.clone(),
                location: truncate(&f.location, 50),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
        println!();
    }

    println!("Summary:");
    println!("  Warnings: {}", report.warnings().count());
    println!("  Alerts: {}", report.alerts().count());
    println!();
    println!("{}", verdict(report));

    Ok(())
}

fn format_classification(classification: Classification) -> String {
    match classification {
        Classification::Bad => "\x1b[31mBAD\x1b[0m".to_string(),
        Classification::Warn => "\x1b[33mWARN\x1b[0m".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ScanReport {
        ScanReport::new(vec![
            Finding::new(Classification::Bad, "yarn.lock", "foo", "1.0.1", "foo@^1.0.0"),
            Finding::new(
                Classification::Warn,
                "package.json",
                "bar",
                "^2.0.0",
                "declared dependency",
            ),
        ])
    }

    #[test]
    fn test_text_lists_warnings_before_alerts() {
        let lines = text_lines(&report());
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("⚠️  WARNING: bar@^2.0.0 in package.json (declared dependency)"));
        assert!(lines[1].starts_with("❌ ALERT: foo@1.0.1 in yarn.lock (foo@^1.0.0)"));
        assert!(lines[1].ends_with("known malicious version"));
        assert_eq!(lines[2], "❌ 1 known malicious version(s) detected.");
    }

    #[test]
    fn test_text_clean_verdict() {
        let lines = text_lines(&ScanReport::new(Vec::new()));
        assert_eq!(lines, vec!["✅ No known malicious versions detected."]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-package-name", 10), "a-very-...");
    }
}
