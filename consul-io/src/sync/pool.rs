use std::fs::FileType;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::paths::{IgnoreList, kv_key_for};

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("admission semaphore is closed")]
    AdmissionClosed,
}

/// One file to upload, produced by the walk and consumed by one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadUnit {
    pub local_path: PathBuf,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Skipped,
    Failed(String),
}

/// Runs the work for a single file. Implementations report failures through
/// the outcome; they never abort the walk.
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    async fn execute(&self, unit: UploadUnit) -> UploadOutcome;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub ignored: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn dispatched(&self) -> usize {
        self.uploaded + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record(&mut self, joined: Result<UploadOutcome, JoinError>) {
        match joined {
            Ok(UploadOutcome::Uploaded) => self.uploaded += 1,
            Ok(UploadOutcome::Skipped) => self.skipped += 1,
            Ok(UploadOutcome::Failed(_)) => self.failed += 1,
            Err(err) => {
                error!("upload task did not complete: {err}");
                self.failed += 1;
            }
        }
    }
}

/// Walks a directory and runs one task per regular file, with at most
/// `limit` tasks holding an admission permit at any time.
///
/// The walk acquires the permit before spawning, so a saturated pool stalls
/// the walk instead of queueing work. The permit moves into the spawned task
/// and is released when the task finishes, whichever way it exits.
pub struct WorkerPool {
    admission: Arc<Semaphore>,
    limit: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            admission: Arc::new(Semaphore::new(limit)),
            limit,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    /// Returns once the walk is over and every dispatched task has finished.
    /// A walk error is returned only after in-flight tasks are joined.
    pub async fn run<E: TaskExecutor>(
        &self,
        root: &Path,
        ignore: &IgnoreList,
        executor: Arc<E>,
    ) -> Result<RunSummary, WalkError> {
        let mut tasks = JoinSet::new();
        let mut summary = RunSummary::default();

        let walked = self
            .walk(root, ignore, &executor, &mut tasks, &mut summary)
            .await;

        while let Some(joined) = tasks.join_next().await {
            summary.record(joined);
        }
        walked?;

        summary.cancelled = self.cancel.is_cancelled();
        Ok(summary)
    }

    async fn walk<E: TaskExecutor>(
        &self,
        root: &Path,
        ignore: &IgnoreList,
        executor: &Arc<E>,
        tasks: &mut JoinSet<UploadOutcome>,
        summary: &mut RunSummary,
    ) -> Result<(), WalkError> {
        let meta = tokio::fs::metadata(root).await.map_err(|source| WalkError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(WalkError::NotADirectory(root.to_path_buf()));
        }

        // Depth-first, pre-order: a subdirectory is finished before its
        // later siblings are visited.
        let mut stack = vec![read_sorted(root).await?.into_iter()];
        while let Some(entries) = stack.last_mut() {
            let Some((path, file_type)) = entries.next() else {
                stack.pop();
                continue;
            };
            if self.cancel.is_cancelled() {
                info!("walk cancelled, no further files will be dispatched");
                break;
            }

            let key = kv_key_for(root, &path);
            if ignore.matches(&path, key.as_deref().ok()) {
                info!("Ignoring path: {}", path.display());
                summary.ignored += 1;
                continue;
            }
            let key = match key {
                Ok(key) => key,
                Err(err) => {
                    error!("Error: cannot derive key for {}: {err}", path.display());
                    summary.failed += 1;
                    continue;
                }
            };

            if file_type.is_dir() {
                stack.push(read_sorted(&path).await?.into_iter());
                continue;
            }
            if file_type.is_symlink() {
                match tokio::fs::metadata(&path).await {
                    Ok(target) if target.is_file() => {}
                    Ok(_) => {
                        debug!("not following directory symlink {}", path.display());
                        continue;
                    }
                    Err(err) => {
                        warn!("skipping dangling symlink {}: {err}", path.display());
                        continue;
                    }
                }
            } else if !file_type.is_file() {
                debug!("skipping special file {}", path.display());
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("walk cancelled, no further files will be dispatched");
                    break;
                }
                permit = Arc::clone(&self.admission).acquire_owned() => {
                    permit.map_err(|_| WalkError::AdmissionClosed)?
                }
            };

            debug!("dispatching {} as {key}", path.display());
            let unit = UploadUnit {
                local_path: path,
                key,
            };
            let executor = Arc::clone(executor);
            tasks.spawn(async move {
                let _permit = permit;
                executor.execute(unit).await
            });

            while let Some(joined) = tasks.try_join_next() {
                summary.record(joined);
            }
        }
        Ok(())
    }
}

async fn read_sorted(dir: &Path) -> Result<Vec<(PathBuf, FileType)>, WalkError> {
    let io_err = |source| WalkError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut reader = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(io_err)? {
        let file_type = entry.file_type().await.map_err(io_err)?;
        entries.push((entry.path(), file_type));
    }
    entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(entries)
}
