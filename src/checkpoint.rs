//! Advisory sync checkpoint and its rollback copy.
//!
//! The advisory fetch stage advances `lastUpdated` before resolution runs,
//! keeping the previous value in a backup file. If resolution then fails,
//! [`CheckpointStore::restore`] puts the backup back so the next fetch
//! covers the same advisories again.
//!
//! ```json
//! { "lastUpdated": "2024-05-01T12:00:00Z" }
//! ```

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct CheckpointStore {
    path: PathBuf,
    backup_path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_path: backup_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.last_updated_file, &config.last_updated_temp_file)
    }

    /// Reads the checkpoint; a missing file means "never synced".
    pub fn load(&self) -> Result<Checkpoint> {
        if !self.path.exists() {
            return Ok(Checkpoint::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::json(&self.path, e))
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        write_checkpoint(&self.path, checkpoint)
    }

    /// Rolls the checkpoint back to the backup, or to `null` without one.
    pub fn restore(&self) -> Result<()> {
        if self.backup_path.exists() {
            let content =
                fs::read_to_string(&self.backup_path).map_err(|e| Error::io(&self.backup_path, e))?;
            ensure_parent(&self.path)?;
            fs::write(&self.path, content).map_err(|e| Error::io(&self.path, e))?;
            info!(path = %self.path.display(), "restored checkpoint from backup");
        } else {
            warn!(
                backup = %self.backup_path.display(),
                "no checkpoint backup, resetting lastUpdated to null"
            );
            self.save(&Checkpoint::default())?;
        }
        Ok(())
    }

    /// Drops the backup once the checkpoint is known to be good.
    pub fn discard_backup(&self) -> Result<()> {
        match fs::remove_file(&self.backup_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&self.backup_path, e)),
        }
    }
}

fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(checkpoint).map_err(|e| Error::json(path, e))?;
    fs::write(path, content).map_err(|e| Error::io(path, e))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store_in(dir: &Path) -> CheckpointStore {
        CheckpointStore::new(dir.join("lastUpdated.json"), dir.join("lastUpdatedTemp.json"))
    }

    fn checkpoint_at(year: i32) -> Checkpoint {
        Checkpoint {
            last_updated: Some(Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_missing_checkpoint_loads_as_never_synced() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(dir.path()).load().unwrap(), Checkpoint::default());
    }

    #[test]
    fn test_json_field_name() {
        let parsed: Checkpoint =
            serde_json::from_str(r#"{ "lastUpdated": "2024-05-01T12:00:00Z" }"#).unwrap();
        assert!(parsed.last_updated.is_some());

        let null = serde_json::to_string(&Checkpoint::default()).unwrap();
        assert_eq!(null, r#"{"lastUpdated":null}"#);
    }

    fn write_backup(dir: &Path, checkpoint: &Checkpoint) {
        let content = serde_json::to_string(checkpoint).unwrap();
        fs::write(dir.join("lastUpdatedTemp.json"), content).unwrap();
    }

    #[test]
    fn test_restore_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        write_backup(dir.path(), &checkpoint_at(2023));
        store.save(&checkpoint_at(2024)).unwrap();

        store.restore().unwrap();
        assert_eq!(store.load().unwrap(), checkpoint_at(2023));
    }

    #[test]
    fn test_restore_without_backup_resets_to_null() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.save(&checkpoint_at(2024)).unwrap();

        store.restore().unwrap();
        assert_eq!(store.load().unwrap().last_updated, None);
    }

    #[test]
    fn test_discard_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        write_backup(dir.path(), &checkpoint_at(2024));

        store.discard_backup().unwrap();
        assert!(!dir.path().join("lastUpdatedTemp.json").exists());
        // Discarding twice is fine.
        store.discard_backup().unwrap();
    }
}
