//! Advisory scan for credentials committed in plain text.
//!
//! Configuration files are expected to pull secrets from Vault through
//! consul-template blocks such as `{{ with secret "kv/app" }}...{{ end }}`.
//! A file that fetches anything from Vault is trusted as a whole; otherwise
//! each marker like `Password` it contains is reported once and appended to
//! the findings log. Findings never block an upload.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const DEFAULT_MARKERS: &[&str] = &["Password", "Token"];
pub const VAULT_BLOCK_OPEN: &str = "{{ with secret \"kv/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub path: PathBuf,
    pub marker: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Warning: The configuration contains a sensitive key '{}' that is not stored in Vault in file {}.",
            self.marker,
            self.path.display()
        )
    }
}

#[derive(Debug, Clone)]
pub struct SensitiveScanner {
    markers: Vec<String>,
}

impl Default for SensitiveScanner {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().map(|m| m.to_string()))
    }
}

impl SensitiveScanner {
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    pub fn scan(&self, path: &Path, content: &str) -> Vec<Finding> {
        if content.contains(VAULT_BLOCK_OPEN) {
            return Vec::new();
        }
        self.markers
            .iter()
            .filter(|marker| content.contains(marker.as_str()))
            .map(|marker| Finding {
                path: path.to_path_buf(),
                marker: marker.clone(),
            })
            .collect()
    }
}

/// Append-only findings file shared by all tasks of a run.
pub struct FindingsLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FindingsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes all lines for one file in a single append.
    pub async fn append(&self, findings: &[Finding]) -> io::Result<()> {
        if findings.is_empty() {
            return Ok(());
        }
        let mut text = String::new();
        for finding in findings {
            text.push_str(&finding.to_string());
            text.push('\n');
        }

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await
    }
}
