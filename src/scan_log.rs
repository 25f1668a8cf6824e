//! Append-only diagnostics log for scans.
//!
//! Lines look like `[2024-05-01T12:00:00.000Z] Scanning ./package.json` and
//! go to `scan-compromised.log` in the project root.

use crate::error::{Error, Result};
use chrono::{SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ScanLog {
    path: PathBuf,
}

impl ScanLog {
    pub const FILE_NAME: &'static str = "scan-compromised.log";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log in the project root above `start`.
    pub fn for_project(start: &Path) -> Self {
        let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
        let root = find_project_root(&start).unwrap_or(start.as_path());
        Self::new(root.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        writeln!(file, "[{timestamp}] {message}").map_err(|e| Error::io(&self.path, e))
    }
}

/// Nearest ancestor of `start` (itself included) holding a `package.json`.
pub fn find_project_root(start: &Path) -> Option<&Path> {
    start
        .ancestors()
        .find(|dir| dir.join("package.json").is_file())
}
