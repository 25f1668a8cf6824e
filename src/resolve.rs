//! Resolution of advisory ranges into concrete vulnerable versions.
//!
//! Each `(package, range)` pair from the advisory map becomes one task. A
//! task asks the registry for every published version of the package and
//! keeps those inside the range. Results are unioned into the
//! [`ThreatDb`], which is then saved atomically.
//!
//! Registry failures never fail the run: a task that exhausts its retries
//! contributes an empty version list. Local failures (unreadable advisory
//! map, corrupt database, failed save) do, and leave the database file as
//! it was.

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::db::{DbLock, ThreatDb};
use crate::error::{Error, Result};
use crate::registry::{retry_with_backoff, RegistryClient, RetryPolicy};
use crate::runner::run_bounded;
use crate::version::{self, Range, Version};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Package name to the version ranges its advisories list.
pub type AdvisoryMap = BTreeMap<String, BTreeSet<String>>;

pub fn load_advisories(path: &Path) -> Result<AdvisoryMap> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| Error::json(path, e))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTask {
    pub package: String,
    pub range: String,
}

/// One task per `(package, range)` pair.
pub fn tasks_from(advisories: &AdvisoryMap) -> Vec<ResolveTask> {
    advisories
        .iter()
        .flat_map(|(package, ranges)| {
            ranges.iter().map(move |range| ResolveTask {
                package: package.clone(),
                range: range.clone(),
            })
        })
        .collect()
}

/// The published versions inside `range`, highest first.
pub fn vulnerable_versions(mut versions: Vec<String>, range: &str) -> Vec<String> {
    let range = Range::parse(range);
    version::sort_descending(&mut versions);
    versions.retain(|v| range.matches(&Version::parse(v)));
    versions
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub package: String,
    pub versions: Vec<String>,
}

pub struct Resolver {
    registry: Arc<dyn RegistryClient>,
    policy: RetryPolicy,
    concurrency: usize,
    show_progress: bool,
}

impl Resolver {
    pub fn new(registry: Arc<dyn RegistryClient>, policy: RetryPolicy, concurrency: usize) -> Self {
        Self {
            registry,
            policy,
            concurrency,
            show_progress: false,
        }
    }

    pub fn from_config(registry: Arc<dyn RegistryClient>, config: &Config) -> Self {
        Self::new(registry, RetryPolicy::from_config(config), config.concurrency_limit)
    }

    /// Draw a progress bar with an ETA on stderr.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Resolves every task; results are in task order.
    pub async fn resolve(&self, tasks: &[ResolveTask]) -> Vec<Resolution> {
        let total = tasks.len();
        let progress = self.progress_bar(total);
        let completed = AtomicUsize::new(0);
        let start = Instant::now();

        let registry = self.registry.as_ref();
        let policy = self.policy;
        let progress_ref = &progress;
        let completed_ref = &completed;

        let results = run_bounded(tasks, self.concurrency, move |task| async move {
            let published =
                match retry_with_backoff(policy, || registry.versions(&task.package)).await {
                    Ok(versions) => versions,
                    Err(e) => {
                        warn!(
                            package = %task.package,
                            range = %task.range,
                            registry = registry.name(),
                            error = %e,
                            "giving up on package after retries"
                        );
                        Vec::new()
                    }
                };
            let versions = vulnerable_versions(published, &task.range);

            let done = completed_ref.fetch_add(1, Ordering::SeqCst) + 1;
            let eta = format_eta(estimate_remaining(start.elapsed(), done, total));
            progress_ref.set_message(format!("ETA: {eta}"));
            progress_ref.inc(1);
            debug!(
                package = %task.package,
                matched = versions.len(),
                completed = done,
                total,
                %eta,
                "resolved range"
            );

            Ok::<_, Error>(Resolution {
                package: task.package.clone(),
                versions,
            })
        })
        .await;

        progress.finish_and_clear();
        results.into_iter().flatten().collect()
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "processing {pos} of {len} packages [{bar:40.cyan/blue}] {percent}% {msg}",
        )
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

/// Time left if the remaining tasks take as long as the completed ones did
/// on average.
pub fn estimate_remaining(elapsed: Duration, completed: usize, total: usize) -> Duration {
    if completed == 0 {
        return Duration::ZERO;
    }
    let remaining = total.saturating_sub(completed);
    elapsed.mul_f64(remaining as f64 / completed as f64)
}

pub fn format_eta(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Unions every resolution into `db`. Packages with no matching versions
/// still get an entry.
pub fn merge_into(db: &mut ThreatDb, resolutions: Vec<Resolution>) {
    for Resolution { package, versions } in resolutions {
        db.merge(&package, versions);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Distinct packages in the advisory map.
    pub packages: usize,
    pub tasks: usize,
    /// Tasks that matched at least one published version.
    pub matched_tasks: usize,
    pub db_path: PathBuf,
}

impl fmt::Display for ResolveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resolved and merged {} packages into {}",
            self.packages,
            self.db_path.display()
        )
    }
}

/// Runs one full resolution: advisories in, database merged and saved.
///
/// The database lock is held from before the database is read until after
/// it is saved.
pub async fn run_resolution(
    config: &Config,
    registry: Arc<dyn RegistryClient>,
    show_progress: bool,
) -> Result<ResolveSummary> {
    let _lock = DbLock::acquire(&config.threats_file)?;

    let advisories = load_advisories(&config.advisories_file)?;
    let mut db = ThreatDb::load_or_default(&config.threats_file)?;
    let tasks = tasks_from(&advisories);
    info!(
        packages = advisories.len(),
        tasks = tasks.len(),
        concurrency = config.concurrency_limit,
        "resolving advisory ranges"
    );

    let resolutions = Resolver::from_config(registry, config)
        .with_progress(show_progress)
        .resolve(&tasks)
        .await;
    let matched_tasks = resolutions.iter().filter(|r| !r.versions.is_empty()).count();

    merge_into(&mut db, resolutions);
    db.save(&config.threats_file)?;
    info!(path = %config.threats_file.display(), packages = db.len(), "saved database");

    Ok(ResolveSummary {
        packages: advisories.len(),
        tasks: tasks.len(),
        matched_tasks,
        db_path: config.threats_file.clone(),
    })
}

/// [`run_resolution`] plus checkpoint bookkeeping.
///
/// On success the checkpoint backup is dropped. On failure the checkpoint
/// is rolled back so the next advisory fetch covers the same window again.
/// A run refused by the database lock leaves the checkpoint alone, since
/// it belongs to the run holding the lock.
pub async fn resolve_with_checkpoint(
    config: &Config,
    registry: Arc<dyn RegistryClient>,
    show_progress: bool,
) -> Result<ResolveSummary> {
    let checkpoint = CheckpointStore::from_config(config);
    match checkpoint.load() {
        Ok(current) => debug!(last_updated = ?current.last_updated, "current checkpoint"),
        Err(e) => warn!(error = %e, "unreadable checkpoint"),
    }

    match run_resolution(config, registry, show_progress).await {
        Ok(summary) => {
            if let Err(e) = checkpoint.discard_backup() {
                warn!(error = %e, "failed to remove checkpoint backup");
            }
            Ok(summary)
        }
        Err(e @ Error::Locked(_)) => Err(e),
        Err(e) => {
            error!(error = %e, "resolution failed, restoring checkpoint");
            if let Err(restore_err) = checkpoint.restore() {
                error!(error = %restore_err, "failed to restore checkpoint");
            }
            Err(e)
        }
    }
}
