//! Vulnerability database: package name to known-bad versions.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "left-pad": ["1.3.0"],
//!   "event-stream": ["3.3.6"]
//! }
//! ```
//!
//! Entries only ever grow: [`ThreatDb::merge`] unions new versions into the
//! existing set. Writes go through a temporary file in the same directory
//! followed by a rename, so readers never observe a half-written file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreatDb {
    packages: BTreeMap<String, BTreeSet<String>>,
}

impl ThreatDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the database from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::json(path, e))
    }

    /// Reads the database, or starts an empty one if `path` doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no existing database, starting empty");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Atomically replaces the file at `path` with this database.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, self).map_err(|e| Error::json(path, e))?;
        tmp.write_all(b"\n").map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
        Ok(())
    }

    /// Unions `versions` into the entry for `package`, creating it if absent.
    pub fn merge<I>(&mut self, package: &str, versions: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.packages
            .entry(package.to_string())
            .or_default()
            .extend(versions);
    }

    pub fn versions(&self, package: &str) -> Option<&BTreeSet<String>> {
        self.packages.get(package)
    }

    /// Whether `package` appears in the database at all.
    pub fn is_flagged(&self, package: &str) -> bool {
        self.packages.contains_key(package)
    }

    /// Whether this exact version of `package` is known to be bad.
    pub fn is_vulnerable(&self, package: &str, version: &str) -> bool {
        self.packages
            .get(package)
            .is_some_and(|versions| versions.contains(version))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Exclusive claim on a database file for the duration of a resolution run.
///
/// The lock is a sibling `<file>.lock` created with create-new semantics and
/// removed on drop.
#[derive(Debug)]
pub struct DbLock {
    path: PathBuf,
}

impl DbLock {
    pub fn acquire(db_path: &Path) -> Result<Self> {
        let path = lock_path(db_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                // Owner pid, for whoever finds a stale lock.
                let _ = writeln!(file, "{}", std::process::id());
                debug!(path = %path.display(), "acquired database lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::Locked(path.display().to_string()))
            }
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DbLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
