use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use consul_io_core::ConsulError;
use thiserror::Error;
use tracing::{error, info, warn};

use super::fingerprint;
use super::pool::{TaskExecutor, UploadOutcome, UploadUnit};
use super::retry::{RetryError, RetryPolicy};
use super::scan::{FindingsLog, SensitiveScanner};
use super::store::{KvConnector, KvStore};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to connect to the store: {0}")]
    Connect(#[source] ConsulError),
    #[error("failed to read remote value of {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: RetryError<ConsulError>,
    },
    #[error("failed to read {path}: {source}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to upload {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: RetryError<ConsulError>,
    },
}

/// Uploads one file unless the store already holds identical content.
pub struct UploadTask<C: KvConnector> {
    connector: C,
    retry: RetryPolicy,
    scanner: SensitiveScanner,
    findings: Arc<FindingsLog>,
}

impl<C: KvConnector> UploadTask<C> {
    pub fn new(
        connector: C,
        retry: RetryPolicy,
        scanner: SensitiveScanner,
        findings: Arc<FindingsLog>,
    ) -> Self {
        Self {
            connector,
            retry,
            scanner,
            findings,
        }
    }

    async fn upload(&self, unit: &UploadUnit) -> Result<UploadOutcome, TaskError> {
        let store = self.connector.connect().await.map_err(TaskError::Connect)?;

        let remote = self
            .retry
            .attempt("get", || store.get(&unit.key))
            .await
            .map_err(|source| TaskError::Fetch {
                key: unit.key.clone(),
                source,
            })?;

        if let Some(remote) = &remote {
            let same = fingerprint::compare(&unit.local_path, remote)
                .await
                .map_err(|source| TaskError::LocalRead {
                    path: unit.local_path.clone(),
                    source,
                })?;
            if same {
                info!("No changes detected for file: {}", unit.local_path.display());
                return Ok(UploadOutcome::Skipped);
            }
        }

        let data = tokio::fs::read(&unit.local_path)
            .await
            .map_err(|source| TaskError::LocalRead {
                path: unit.local_path.clone(),
                source,
            })?;

        self.report_findings(unit, &data).await;

        self.retry
            .attempt("put", || store.put(&unit.key, &data))
            .await
            .map_err(|source| TaskError::Upload {
                key: unit.key.clone(),
                source,
            })?;

        info!("Uploaded {} to {}", unit.local_path.display(), unit.key);
        Ok(UploadOutcome::Uploaded)
    }

    async fn report_findings(&self, unit: &UploadUnit, data: &[u8]) {
        let content = String::from_utf8_lossy(data);
        let findings = self.scanner.scan(&unit.local_path, &content);
        for finding in &findings {
            warn!("{finding}");
        }
        if let Err(err) = self.findings.append(&findings).await {
            error!(
                "Error writing to {}: {err}",
                self.findings.path().display()
            );
        }
    }
}

#[async_trait]
impl<C: KvConnector> TaskExecutor for UploadTask<C> {
    async fn execute(&self, unit: UploadUnit) -> UploadOutcome {
        match self.upload(&unit).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Error: {err}");
                UploadOutcome::Failed(err.to_string())
            }
        }
    }
}
