use consul_io_core::{KvVersion, SecretData, VaultClient, VaultError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cli::SearchArgs;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("either --vault-token or both --username and --password are required")]
    MissingCredentials,
}

/// A secret with at least one value containing the search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: String,
    pub fields: Vec<(String, String)>,
}

impl SearchHit {
    pub fn render(&self) -> String {
        let mut out = format!("FOUND - Path: {}\n", self.path);
        for (name, value) in &self.fields {
            out.push_str(&format!("  {name}: {value}\n"));
        }
        out.push_str(&"-".repeat(40));
        out
    }
}

/// Builds an authenticated client from the command line and checks the token.
pub async fn authenticate(args: &SearchArgs) -> Result<VaultClient, SearchError> {
    let mut client = VaultClient::new(&args.vault_addr)?;
    let token = args.vault_token.as_deref().filter(|t| !t.is_empty());
    match (token, &args.username, &args.password) {
        (Some(token), _, _) => client = client.with_token(token),
        (None, Some(username), Some(password)) => {
            client
                .login(args.auth_type.into(), username, password)
                .await?;
        }
        _ => return Err(SearchError::MissingCredentials),
    }

    let token_info = client.lookup_self().await?;
    info!(
        "Authenticated to Vault as {}",
        token_info.display_name.as_deref().unwrap_or("unknown")
    );
    Ok(client)
}

struct Root {
    mount: String,
    sub: String,
    version: KvVersion,
}

impl Root {
    fn list_path(&self, sub: &str) -> String {
        match self.version {
            KvVersion::V1 => format!("{}{sub}", self.mount),
            KvVersion::V2 => format!("{}metadata/{sub}", self.mount),
        }
    }

    fn read_path(&self, sub: &str) -> String {
        match self.version {
            KvVersion::V1 => format!("{}{sub}", self.mount),
            KvVersion::V2 => format!("{}data/{sub}", self.mount),
        }
    }
}

/// Walks the KV secrets under `path` (or under every KV mount when `path` is
/// `None`) and returns secrets whose string values contain `term`, ignoring
/// case. Unreadable folders and secrets are skipped with a warning.
pub async fn search(
    client: &VaultClient,
    term: &str,
    path: Option<&str>,
    version: KvVersion,
) -> Result<Vec<SearchHit>, SearchError> {
    let roots = match path {
        Some(path) => vec![split_path(path, version)],
        None => client
            .list_mounts()
            .await?
            .into_iter()
            .filter_map(|mount| {
                mount.kv_version.map(|version| Root {
                    mount: mount.path,
                    sub: String::new(),
                    version,
                })
            })
            .collect(),
    };

    let needle = term.to_lowercase();
    let mut hits = Vec::new();
    for root in &roots {
        search_root(client, root, &needle, &mut hits).await;
    }
    Ok(hits)
}

async fn search_root(client: &VaultClient, root: &Root, needle: &str, hits: &mut Vec<SearchHit>) {
    debug!("searching {}{}", root.mount, root.sub);
    let mut pending = vec![root.sub.clone()];
    let mut first = true;

    while let Some(sub) = pending.pop() {
        let keys = match client.list(&root.list_path(&sub)).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!("Failed to list {}{sub}: {err}", root.mount);
                Vec::new()
            }
        };

        // A path naming a single secret lists as empty.
        if first && keys.is_empty() && !sub.is_empty() {
            let leaf = sub.trim_end_matches('/');
            check_secret(client, root, leaf, needle, hits).await;
        }
        first = false;

        let mut folders = Vec::new();
        for key in keys {
            let child = format!("{sub}{key}");
            if key.ends_with('/') {
                folders.push(child);
            } else {
                check_secret(client, root, &child, needle, hits).await;
            }
        }
        // Reverse so folders are visited in listing order.
        pending.extend(folders.into_iter().rev());
    }
}

async fn check_secret(
    client: &VaultClient,
    root: &Root,
    sub: &str,
    needle: &str,
    hits: &mut Vec<SearchHit>,
) {
    let secret = match client.read(&root.read_path(sub)).await {
        Ok(Some(secret)) => secret,
        Ok(None) => return,
        Err(err) => {
            warn!("Failed to read {}{sub}: {err}", root.mount);
            return;
        }
    };
    let data = match root.version {
        KvVersion::V1 => Some(&secret),
        KvVersion::V2 => secret.get("data").and_then(Value::as_object),
    };
    let Some(data) = data else {
        return;
    };

    let fields = matching_fields(data, needle);
    if !fields.is_empty() {
        hits.push(SearchHit {
            path: format!("{}{sub}", root.mount),
            fields,
        });
    }
}

fn matching_fields(data: &SecretData, needle: &str) -> Vec<(String, String)> {
    let mut fields: Vec<_> = data
        .iter()
        .filter_map(|(name, value)| {
            let text = value.as_str()?;
            text.to_lowercase()
                .contains(needle)
                .then(|| (name.clone(), text.to_string()))
        })
        .collect();
    fields.sort();
    fields
}

fn split_path(path: &str, version: KvVersion) -> Root {
    let path = path.trim_matches('/');
    let (mount, rest) = path.split_once('/').unwrap_or((path, ""));
    let sub = if rest.is_empty() {
        String::new()
    } else {
        format!("{rest}/")
    };
    Root {
        mount: format!("{mount}/"),
        sub,
        version,
    }
}
