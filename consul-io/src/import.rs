use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::sync::{
    FindingsLog, KvConnector, RateLimiter, RetryPolicy, RunSummary, UploadTask, WalkError,
    WorkerPool,
};

/// Uploads every file under `root` through `connector`. Per-file failures are
/// counted in the summary; only walk failures end the run with an error.
pub async fn run<C: KvConnector>(
    config: &RunConfig,
    root: &Path,
    connector: C,
    cancel: CancellationToken,
) -> Result<RunSummary, WalkError> {
    let limiter = Arc::new(RateLimiter::new(config.rate_limit));
    let retry = RetryPolicy::new(
        config.retry_limit,
        config.rate_limit,
        limiter,
        cancel.clone(),
    );
    let findings = Arc::new(FindingsLog::new(&config.findings_log));
    let task = Arc::new(UploadTask::new(
        connector,
        retry,
        config.scanner(),
        findings,
    ));
    let pool = WorkerPool::new(config.concurrency).with_cancellation(cancel);

    debug!(
        "importing {} with concurrency {} and retry limit {}",
        root.display(),
        pool.limit(),
        config.retry_limit
    );
    let summary = pool.run(root, &config.ignore, task).await?;
    info!(
        uploaded = summary.uploaded,
        skipped = summary.skipped,
        failed = summary.failed,
        ignored = summary.ignored,
        "import finished"
    );
    Ok(summary)
}
