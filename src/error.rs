//! Error types.
//!
//! [`Error`] covers everything the library can fail with. Lockfile dialects
//! report [`ParseError`] instead, so the scanner can decide to skip a single
//! file without treating it as fatal.
//!
//! # Categories
//!
//! - **Configuration**: `Config`, fatal at startup
//! - **File I/O**: `Io`, `Json`
//! - **Registry**: `Registry`, retried by the resolution pipeline
//! - **Concurrency**: `Locked`, another resolution run holds the database

use std::path::Path;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required setting or file is missing or invalid.
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    #[error("io error: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The registry could not be queried for a package.
    #[error("registry request for {package} failed: {reason}")]
    Registry { package: String, reason: String },

    /// Another process holds the database lock.
    #[error("database is locked by another resolution run: {0}")]
    Locked(String),
}

impl Error {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Failure to extract dependency facts from one manifest.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{dialect}: invalid JSON: {source}")]
    Json {
        dialect: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The document parsed but does not have the expected structure.
    #[error("{dialect}: {reason}")]
    Shape {
        dialect: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::config("concurrency_limit", "must be greater than 0");
        let msg = err.to_string();
        assert!(msg.contains("concurrency_limit"));
        assert!(msg.contains("must be greater than 0"));
    }

    #[test]
    fn test_io_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = Error::io(Path::new("data/threats.json"), io_err);
        let msg = err.to_string();
        assert!(msg.contains("data/threats.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_registry_error_display() {
        let err = Error::Registry {
            package: "left-pad".to_owned(),
            reason: "503 Service Unavailable".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("left-pad"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_parse_error_names_dialect() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ParseError::Json {
            dialect: "package-lock.json",
            source,
        };
        assert!(err.to_string().starts_with("package-lock.json"));
    }
}
