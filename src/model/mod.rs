//! Core data types for dependency facts, findings and scan reports.
//!
//! - [`DependencyFact`] - One (package, version, provenance) extracted from a manifest
//! - [`Finding`] - A fact classified against the vulnerability database
//! - [`ScanReport`] - All findings of one scan
//!
//! # Example
//!
//! ```
//! use threatscan::model::{Classification, Finding, ScanReport};
//!
//! let finding = Finding::new(Classification::Bad, "yarn.lock", "foo", "1.0.1", "foo@^1.0.0");
//! let report = ScanReport::new(vec![finding]);
//!
//! assert!(!report.is_clean());
//! assert_eq!(report.alerts().count(), 1);
//! ```

mod dependency;
mod finding;

pub use dependency::*;
pub use finding::*;
