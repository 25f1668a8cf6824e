//! Configuration file handling.
//!
//! This module provides loading and saving of threatscan configuration
//! from a TOML file. A single [`Config`] is built at startup and passed by
//! reference to every component.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/threatscan/config.toml`
//! - macOS: `~/Library/Application Support/threatscan/config.toml`
//! - Windows: `%APPDATA%\threatscan\config.toml`
//!
//! Any other file can be loaded with [`Config::load_from`].
//!
//! # Example Configuration
//!
//! ```toml
//! registry_url = "https://registry.npmjs.org/"
//! threats_file = "data/threats.json"
//! advisories_file = "data/advisories.json"
//! concurrency_limit = 10
//! max_retries = 3
//! retry_delay_ms = 500
//! default_format = "text"
//! scan_log = false
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration.
///
/// Missing keys fall back to their defaults, so a partial file is valid.
///
/// # Example
///
/// ```no_run
/// use threatscan::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Registry: {}", config.registry_url);
/// println!("Concurrency: {}", config.concurrency_limit);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the npm registry; the package name is appended.
    ///
    /// Default: `https://registry.npmjs.org/`
    pub registry_url: String,

    /// Vulnerability database written by `resolve` and read by `scan`.
    ///
    /// Default: `data/threats.json`
    pub threats_file: PathBuf,

    /// Advisory map (package name to vulnerable ranges) consumed by `resolve`.
    ///
    /// Default: `data/advisories.json`
    pub advisories_file: PathBuf,

    /// Checkpoint holding the last advisory sync timestamp.
    ///
    /// Default: `data/lastUpdated.json`
    pub last_updated_file: PathBuf,

    /// Backup of the checkpoint taken before it was advanced, restored when
    /// a resolution run fails.
    ///
    /// Default: `data/lastUpdatedTemp.json`
    pub last_updated_temp_file: PathBuf,

    /// Maximum number of registry queries in flight.
    ///
    /// Default: 10
    pub concurrency_limit: usize,

    /// Retries per registry query after the first attempt.
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Backoff unit in milliseconds; retry `n` waits `n` units.
    ///
    /// Default: 500
    pub retry_delay_ms: u64,

    /// `User-Agent` header sent to the registry.
    pub user_agent: String,

    /// Default scan output format when no `--format` flag is provided.
    ///
    /// Valid values: "text", "table", "json"
    /// Default: "text"
    pub default_format: String,

    /// Append scan diagnostics to `scan-compromised.log` in the project root.
    ///
    /// Default: false
    pub scan_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: "https://registry.npmjs.org/".to_string(),
            threats_file: PathBuf::from("data/threats.json"),
            advisories_file: PathBuf::from("data/advisories.json"),
            last_updated_file: PathBuf::from("data/lastUpdated.json"),
            last_updated_temp_file: PathBuf::from("data/lastUpdatedTemp.json"),
            concurrency_limit: 10,
            max_retries: 3,
            retry_delay_ms: 500,
            user_agent: "npm-threat-resolver/1.0".to_string(),
            default_format: "text".to_string(),
            scan_log: false,
        }
    }
}

impl Config {
    /// Loads configuration from the default config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Loads configuration from an explicit file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(path.display().to_string(), e.to_string()))
    }

    /// Rejects values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.registry_url.trim().is_empty() {
            return Err(Error::config("registry_url", "must not be empty"));
        }
        if self.concurrency_limit == 0 {
            return Err(Error::config(
                "concurrency_limit",
                "must be greater than 0",
            ));
        }

        let files = [
            ("threats_file", &self.threats_file),
            ("advisories_file", &self.advisories_file),
            ("last_updated_file", &self.last_updated_file),
            ("last_updated_temp_file", &self.last_updated_temp_file),
        ];
        for (field, path) in files {
            if path.as_os_str().is_empty() {
                return Err(Error::config(field, "must not be empty"));
            }
        }

        Ok(())
    }

    /// Saves the configuration to `path`.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        fs::write(path, Self::render(self)).map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use threatscan::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("threatscan/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("threatscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        Self::render(&Config::default())
    }

    fn render(config: &Config) -> String {
        toml::to_string_pretty(config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.registry_url, "https://registry.npmjs.org/");
        assert_eq!(config.threats_file, PathBuf::from("data/threats.json"));
        assert_eq!(config.concurrency_limit, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.default_format, "text");
        assert!(!config.scan_log);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency_limit = 4\nscan_log = true\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.concurrency_limit, 4);
        assert!(config.scan_log);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.advisories_file, PathBuf::from("data/advisories.json"));
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_load_from_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency_limit = \"many\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            concurrency_limit: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency_limit"));
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let config = Config {
            threats_file: PathBuf::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            registry_url: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generate_default_config_round_trips() {
        let rendered = Config::generate_default_config();
        assert!(rendered.contains("concurrency_limit = 10"));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.user_agent, "npm-threat-resolver/1.0");
    }

    #[test]
    fn test_save_to_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            max_retries: 5,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.max_retries, 5);
        assert_eq!(loaded.threats_file, config.threats_file);
    }
}
