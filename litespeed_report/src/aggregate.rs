//! Collect every report in a directory into one [`Snapshot`].
//!
//! Each report file is loaded by its own task. Finished snapshots are paired
//! off as they arrive and every pair is merged by a further task on the same
//! `JoinSet`, so the set drains to exactly one snapshot without any
//! bookkeeping of how many results are still outstanding.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use litespeed_signal::Watcher;
use serde::Deserialize;
use tokio::{fs, sync::Semaphore, task::JoinSet};
use tracing::{debug, info, warn};

use crate::{Error, REPORT_FILE_PREFIX, load::load, merge::merge, snapshot::Snapshot};

fn default_concurrency_limit() -> usize {
    32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
/// Configuration for [`Aggregator`]
pub struct Config {
    /// Upper bound on report files loaded at the same time. Zero is treated
    /// as one.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

#[derive(Debug)]
/// Loads and merges the reports of one directory
pub struct Aggregator {
    config: Config,
    shutdown: Watcher,
}

impl Aggregator {
    /// Create a new [`Aggregator`]. Collections in flight when `shutdown` is
    /// signalled are abandoned.
    #[must_use]
    pub fn new(config: Config, shutdown: Watcher) -> Self {
        Self { config, shutdown }
    }

    /// Load every report file in `dir` and merge them into one `Snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryUnreadable`] if `dir` cannot be listed,
    /// [`Error::NoReportFiles`] if it holds no report files,
    /// [`Error::Shutdown`] if the shutdown signal arrived mid collection and
    /// otherwise the error of any report that failed to load. When several
    /// reports fail their errors are combined.
    pub async fn collect(&self, dir: &Path) -> Result<Snapshot, Error> {
        let paths = discover(dir).await?;
        if paths.is_empty() {
            warn!("No report files in {dir:?}");
            return Err(Error::NoReportFiles(dir.to_path_buf()));
        }
        debug!("Collecting {total} report files from {dir:?}", total = paths.len());

        let sem = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));
        let mut join_set: JoinSet<Option<Snapshot>> = JoinSet::new();

        for path in paths {
            let sem = Arc::clone(&sem);
            let shutdown = self.shutdown.clone();
            join_set.spawn(async move {
                tokio::select! {
                    biased;

                    () = shutdown.recv() => None,
                    snapshot = async {
                        let Ok(_permit) = sem.acquire().await else {
                            return Snapshot::failed(Error::Worker("load semaphore closed".to_string()));
                        };
                        load(path).await
                    } => Some(snapshot),
                }
            });
        }

        let mut pending: Option<Snapshot> = None;
        while let Some(joined) = join_set.join_next().await {
            let snapshot = match joined {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    info!("Shutdown signal received, abandoning collection of {dir:?}");
                    // Dropping `join_set` aborts whatever is still running.
                    return Err(Error::Shutdown);
                }
                Err(e) => {
                    warn!("Report worker failed: {e}");
                    Snapshot::failed(Error::Worker(e.to_string()))
                }
            };

            match pending.take() {
                None => pending = Some(snapshot),
                Some(other) => {
                    join_set.spawn(async move { Some(merge(other, snapshot)) });
                }
            }
        }

        pending
            .ok_or_else(|| Error::NoReportFiles(dir.to_path_buf()))?
            .into_result()
    }
}

/// List the report files directly inside `dir`, sorted by path.
///
/// A report file is any non-directory entry whose name starts with
/// [`REPORT_FILE_PREFIX`].
///
/// # Errors
///
/// Returns [`Error::DirectoryUnreadable`] if `dir` cannot be listed.
pub async fn discover(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let unreadable = |source| Error::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir).await.map_err(unreadable)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        if !entry
            .file_name()
            .to_string_lossy()
            .starts_with(REPORT_FILE_PREFIX)
        {
            continue;
        }
        if entry.file_type().await.map_err(unreadable)?.is_dir() {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
