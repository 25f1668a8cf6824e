use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// The observed version is a known-bad version.
    Bad,
    /// The package has bad versions, but not the one observed.
    Warn,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Bad => "bad",
            Classification::Warn => "warn",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub classification: Classification,
    /// Manifest file name, e.g. `package-lock.json`.
    pub file: String,
    pub package: String,
    /// Observed version, or the declared range for `package.json`.
    pub version: String,
    pub location: String,
}

impl Finding {
    pub fn new(
        classification: Classification,
        file: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            classification,
            file: file.into(),
            package: package.into(),
            version: version.into(),
            location: location.into(),
        }
    }

    pub fn is_bad(&self) -> bool {
        self.classification == Classification::Bad
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_time: DateTime<Utc>,
    /// Manifest files that were read, in scan order.
    pub files_scanned: Vec<String>,
    pub findings: Vec<Finding>,
}

impl ScanReport {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            scan_time: Utc::now(),
            files_scanned: Vec::new(),
            findings,
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_bad())
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_bad())
    }

    /// A scan passes when no known-bad version was found.
    pub fn is_clean(&self) -> bool {
        !self.findings.iter().any(Finding::is_bad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_splits_warnings_and_alerts() {
        let report = ScanReport::new(vec![
            Finding::new(Classification::Warn, "package.json", "a", "^1.0.0", "declared dependency"),
            Finding::new(Classification::Bad, "yarn.lock", "b", "2.0.0", "b@^2.0.0"),
            Finding::new(Classification::Warn, "yarn.lock", "c", "3.0.0", "c@^3.0.0"),
        ]);

        let warned: Vec<&str> = report.warnings().map(|f| f.package.as_str()).collect();
        let alerted: Vec<&str> = report.alerts().map(|f| f.package.as_str()).collect();
        assert_eq!(warned, vec!["a", "c"]);
        assert_eq!(alerted, vec!["b"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_warnings_only_is_clean() {
        let report = ScanReport::new(vec![Finding::new(
            Classification::Warn,
            "pnpm-lock.yaml",
            "a",
            "1.0.0",
            "a@1.0.0",
        )]);
        assert!(report.is_clean());
        assert!(ScanReport::new(Vec::new()).is_clean());
    }

    #[test]
    fn test_classification_serializes_lowercase() {
        let json = serde_json::to_string(&Classification::Bad).unwrap();
        assert_eq!(json, "\"bad\"");
        assert_eq!(Classification::Warn.to_string(), "warn");
    }
}
