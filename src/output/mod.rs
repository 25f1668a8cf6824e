mod cli;
mod json;

pub use cli::{print_cli_table, print_text};
pub use json::print_json;

use crate::model::ScanReport;
use anyhow::Result;

/// Output format for scan reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per finding plus a verdict
    Text,
    /// Findings as a table
    Table,
    /// JSON format for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Unknown format: {}. Use 'text', 'table', or 'json'",
                s
            )),
        }
    }
}

pub fn print_report(report: &ScanReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print_text(report),
        OutputFormat::Table => print_cli_table(report),
        OutputFormat::Json => print_json(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("text"), Ok(OutputFormat::Text));
        assert_eq!(OutputFormat::from_str("TABLE"), Ok(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("json"), Ok(OutputFormat::Json));
        assert!(OutputFormat::from_str("sarif").unwrap_err().contains("sarif"));
    }
}
