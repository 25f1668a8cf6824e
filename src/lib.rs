pub mod checkpoint;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod output;
pub mod registry;
pub mod resolve;
pub mod runner;
pub mod scan_log;
pub mod scanner;
pub mod version;

pub use config::Config;
pub use db::ThreatDb;
pub use error::{Error, Result};
pub use model::{Classification, DependencyFact, Finding, ScanReport};
pub use scanner::Scanner;
