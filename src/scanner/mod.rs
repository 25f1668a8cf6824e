//! Manifest and lockfile scanning.
//!
//! A [`Dialect`] turns the text of one manifest into [`DependencyFact`]s;
//! the [`Scanner`] classifies those facts against a [`ThreatDb`].
//!
//! # Supported files
//!
//! | Dialect | File | Facts |
//! |---------|------|-------|
//! | [`Dialect::PackageJson`] | `package.json` | declared ranges |
//! | [`Dialect::PackageLock`] | `package-lock.json` | resolved versions |
//! | [`Dialect::YarnLock`] | `yarn.lock` (classic and Berry) | resolved versions |
//! | [`Dialect::PnpmLock`] | `pnpm-lock.yaml` | resolved versions |
//!
//! # Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use threatscan::{db::ThreatDb, scanner::Scanner};
//!
//! let db = ThreatDb::load(Path::new("data/threats.json"))?;
//! let report = Scanner::new(&db).scan_dir(Path::new("."));
//! for finding in report.alerts() {
//!     println!("{}@{}", finding.package, finding.version);
//! }
//! # Ok::<(), threatscan::Error>(())
//! ```

mod package_json;
mod package_lock;
mod pnpm;
mod yarn;

use crate::db::ThreatDb;
use crate::error::ParseError;
use crate::model::{Classification, DependencyFact, FactKind, Finding, ScanReport};
use crate::scan_log::ScanLog;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One supported manifest format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    PackageJson,
    PackageLock,
    YarnLock,
    PnpmLock,
}

impl Dialect {
    /// Every dialect, in scan order.
    pub const ALL: [Dialect; 4] = [
        Dialect::PackageJson,
        Dialect::PackageLock,
        Dialect::YarnLock,
        Dialect::PnpmLock,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Dialect::PackageJson => "package.json",
            Dialect::PackageLock => "package-lock.json",
            Dialect::YarnLock => "yarn.lock",
            Dialect::PnpmLock => "pnpm-lock.yaml",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.file_name() == name)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_file_name)
    }

    /// Extracts every dependency fact from the file's text.
    pub fn extract(&self, text: &str) -> Result<Vec<DependencyFact>, ParseError> {
        match self {
            Dialect::PackageJson => package_json::extract(text),
            Dialect::PackageLock => package_lock::extract(text),
            Dialect::YarnLock => Ok(yarn::extract(text)),
            Dialect::PnpmLock => Ok(pnpm::extract(text)),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Classifies one fact; `None` means the package is not in the database.
///
/// Resolved versions are bad when they are a known-bad version. Declared
/// ranges are bad only when they pin a known-bad version exactly, either
/// bare or with a leading `=`.
pub fn classify(db: &ThreatDb, fact: &DependencyFact) -> Option<Classification> {
    if !db.is_flagged(&fact.package) {
        return None;
    }

    let bad = match fact.kind {
        FactKind::Resolved => db.is_vulnerable(&fact.package, &fact.version),
        FactKind::Declared => {
            let pinned = fact.version.strip_prefix('=').unwrap_or(&fact.version);
            db.is_vulnerable(&fact.package, &fact.version)
                || db.is_vulnerable(&fact.package, pinned)
        }
    };

    Some(if bad {
        Classification::Bad
    } else {
        Classification::Warn
    })
}

/// Scans manifests in a directory against a vulnerability database.
pub struct Scanner<'a> {
    db: &'a ThreatDb,
    log: Option<ScanLog>,
}

impl<'a> Scanner<'a> {
    pub fn new(db: &'a ThreatDb) -> Self {
        Self { db, log: None }
    }

    /// Also append diagnostics to `log`.
    pub fn with_log(mut self, log: ScanLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Classifies the facts of one manifest.
    pub fn scan_text(&self, dialect: Dialect, text: &str) -> Result<Vec<Finding>, ParseError> {
        let facts = dialect.extract(text)?;
        debug!(file = dialect.file_name(), facts = facts.len(), "extracted dependencies");

        Ok(facts
            .into_iter()
            .filter_map(|fact| {
                let classification = classify(self.db, &fact)?;
                Some(Finding::new(
                    classification,
                    dialect.file_name(),
                    fact.package,
                    fact.version,
                    fact.provenance,
                ))
            })
            .collect())
    }

    /// Scans every supported manifest present in `dir`.
    ///
    /// Missing files are skipped. Files that can't be read or parsed are
    /// logged and skipped; the other files are still scanned.
    pub fn scan_dir(&self, dir: &Path) -> ScanReport {
        let paths: Vec<PathBuf> = Dialect::ALL
            .iter()
            .map(|dialect| dir.join(dialect.file_name()))
            .filter(|path| path.is_file())
            .collect();
        self.scan_paths(&paths)
    }

    /// Scans the given manifest files, in order.
    ///
    /// A path whose file name is not a supported manifest is skipped.
    pub fn scan_paths(&self, paths: &[PathBuf]) -> ScanReport {
        let mut report = ScanReport::new(Vec::new());

        for path in paths {
            self.scan_file(path, &mut report);
        }

        let alerts = report.alerts().count();
        self.note(&if alerts == 0 {
            "No known malicious versions detected.".to_string()
        } else {
            format!("{alerts} known malicious version(s) detected.")
        });

        report
    }

    fn scan_file(&self, path: &Path, report: &mut ScanReport) {
        let Some(dialect) = Dialect::from_path(path) else {
            warn!(path = %path.display(), "not a supported manifest, skipping");
            self.note(&format!("Skipped {}: unsupported file", path.display()));
            return;
        };

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read manifest, skipping");
                self.note(&format!("Could not read {}: {e}", path.display()));
                return;
            }
        };

        self.note(&format!("Scanning {}", path.display()));

        match self.scan_text(dialect, &text) {
            Ok(findings) => {
                for finding in &findings {
                    self.note(&format!(
                        "{} {}@{} in {} ({})",
                        finding.classification.as_str().to_uppercase(),
                        finding.package,
                        finding.version,
                        finding.file,
                        finding.location
                    ));
                }
                report.files_scanned.push(dialect.file_name().to_string());
                report.findings.extend(findings);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse manifest, skipping");
                self.note(&format!("Skipped {}: {e}", path.display()));
            }
        }
    }

    fn note(&self, message: &str) {
        if let Some(log) = &self.log {
            if let Err(e) = log.append(message) {
                warn!(path = %log.path().display(), error = %e, "failed to write scan log");
            }
        }
    }
}
