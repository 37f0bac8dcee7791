use std::io;
use std::path::{Path, PathBuf};

use consul_io_core::{ConsulClient, ConsulError, KvPair};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::sync::paths::{KeyError, local_path_for};
use crate::sync::{FindingsLog, SensitiveScanner};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to connect to consul: {0}")]
    Connect(#[source] ConsulError),
    #[error("failed to list keys: {0}")]
    List(#[source] ConsulError),
    #[error("failed to create {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
enum EntryError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub files: usize,
    pub directories: usize,
    pub failed: usize,
}

/// Mirrors the whole KV store under `root`. Entries that cannot be written
/// are logged and counted; the export carries on with the rest.
pub async fn run(
    client: &ConsulClient,
    root: &Path,
    scanner: &SensitiveScanner,
    findings: &FindingsLog,
) -> Result<ExportSummary, ExportError> {
    client.verify().await.map_err(ExportError::Connect)?;
    let pairs = client.list("").await.map_err(ExportError::List)?;
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|source| ExportError::Root {
            path: root.to_path_buf(),
            source,
        })?;

    let mut summary = ExportSummary::default();
    for pair in &pairs {
        match export_entry(root, pair, scanner, findings).await {
            Ok(true) => summary.directories += 1,
            Ok(false) => summary.files += 1,
            Err(err) => {
                error!("Error exporting {}: {err}", pair.key);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

// Returns whether the entry was a folder.
async fn export_entry(
    root: &Path,
    pair: &KvPair,
    scanner: &SensitiveScanner,
    findings: &FindingsLog,
) -> Result<bool, EntryError> {
    let path = local_path_for(root, &pair.key)?;
    let write_err = |source| EntryError::Write {
        path: path.clone(),
        source,
    };

    if pair.is_dir() {
        tokio::fs::create_dir_all(&path).await.map_err(write_err)?;
        info!("Created directory {}", path.display());
        return Ok(true);
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(&path, &pair.value).await.map_err(write_err)?;
    info!("Exported {} to {}", pair.key, path.display());

    let content = String::from_utf8_lossy(&pair.value);
    let found = scanner.scan(&path, &content);
    for finding in &found {
        warn!("{finding}");
    }
    if let Err(err) = findings.append(&found).await {
        error!("Error writing to {}: {err}", findings.path().display());
    }
    Ok(false)
}
