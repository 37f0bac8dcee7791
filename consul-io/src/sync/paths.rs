use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key is empty")]
    Empty,
    #[error("key contains unsupported component: {0}")]
    UnsupportedComponent(String),
    #[error("{path} is not under {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),
}

/// Derives the KV key of `path`: its location relative to `root`, joined with
/// forward slashes on every platform.
pub fn kv_key_for(root: &Path, path: &Path) -> Result<String, KeyError> {
    let relative = path.strip_prefix(root).map_err(|_| KeyError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| KeyError::NonUtf8(path.to_path_buf()))?,
            ),
            Component::CurDir => continue,
            other => {
                return Err(KeyError::UnsupportedComponent(
                    other.as_os_str().to_string_lossy().into_owned(),
                ));
            }
        }
    }
    if parts.is_empty() {
        return Err(KeyError::Empty);
    }
    Ok(parts.join("/"))
}

/// Maps a KV key back under `root`. Keys that would escape the root are
/// rejected.
pub fn local_path_for(root: &Path, key: &str) -> Result<PathBuf, KeyError> {
    if key.trim_matches('/').is_empty() {
        return Err(KeyError::Empty);
    }

    let mut out = root.to_path_buf();
    for part in key.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(KeyError::UnsupportedComponent(part.to_string())),
            _ => {
                let mut components = Path::new(part).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => out.push(part),
                    _ => return Err(KeyError::UnsupportedComponent(part.to_string())),
                }
            }
        }
    }
    Ok(out)
}

/// Path prefixes excluded from an import.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    prefixes: Vec<String>,
}

impl IgnoreList {
    pub fn new(prefixes: impl IntoIterator<Item = String>) -> Self {
        Self {
            prefixes: prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    /// Matches plain string prefixes against both the path as walked
    /// (`<root>/<relative>`) and the entry's key. Entries without a usable
    /// key are matched on the walked path alone.
    pub fn matches(&self, walked: &Path, key: Option<&str>) -> bool {
        let walked = walked.to_string_lossy();
        self.prefixes.iter().any(|prefix| {
            walked.starts_with(prefix.as_str())
                || key.is_some_and(|key| key.starts_with(prefix.as_str()))
        })
    }
}
