use std::collections::HashMap;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

const TOKEN_HEADER: &str = "X-Vault-Token";

pub type SecretData = Map<String, Value>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("address cannot be used as a base url: {0}")]
    BaseUrl(String),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("login response did not contain a client token")]
    MissingAuth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Ldap,
    Userpass,
}

impl AuthMethod {
    fn mount(self) -> &'static str {
        match self {
            AuthMethod::Ldap => "ldap",
            AuthMethod::Userpass => "userpass",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvVersion {
    V1,
    V2,
}

/// A secrets engine mount as reported by `sys/mounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub path: String,
    pub kind: String,
    pub kv_version: Option<KvVersion>,
}

#[derive(Debug, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Clone)]
pub struct VaultClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl VaultClient {
    pub fn new(address: &str) -> Result<Self, VaultError> {
        let base_url = Url::parse(address)?;
        if base_url.cannot_be_a_base() {
            return Err(VaultError::BaseUrl(address.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Exchanges username and password for a client token and keeps it for
    /// subsequent requests.
    pub async fn login(
        &mut self,
        method: AuthMethod,
        username: &str,
        password: &str,
    ) -> Result<(), VaultError> {
        let url = self.api_url(&format!("auth/{}/login/{}", method.mount(), username))?;
        let response = self
            .request(Method::POST, url)
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await?;
        let payload: LoginResponse = Self::handle_response(response).await?;
        let token = payload
            .auth
            .map(|auth| auth.client_token)
            .filter(|token| !token.is_empty())
            .ok_or(VaultError::MissingAuth)?;
        self.token = Some(token);
        Ok(())
    }

    pub async fn lookup_self(&self) -> Result<TokenInfo, VaultError> {
        let url = self.api_url("auth/token/lookup-self")?;
        let response = self.request(Method::GET, url).send().await?;
        let payload: DataResponse<TokenInfo> = Self::handle_response(response).await?;
        Ok(payload.data)
    }

    pub async fn list_mounts(&self) -> Result<Vec<Mount>, VaultError> {
        let url = self.api_url("sys/mounts")?;
        let response = self.request(Method::GET, url).send().await?;
        let payload: Value = Self::handle_response(response).await?;
        Ok(parse_mounts(&payload))
    }

    /// Lists child keys of `path`; folders carry a trailing slash. A missing
    /// path lists as empty.
    pub async fn list(&self, path: &str) -> Result<Vec<String>, VaultError> {
        let mut url = self.api_url(path)?;
        url.query_pairs_mut().append_pair("list", "true");
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let payload: DataResponse<KeyList> = Self::handle_response(response).await?;
        Ok(payload.data.keys)
    }

    pub async fn read(&self, path: &str) -> Result<Option<SecretData>, VaultError> {
        let url = self.api_url(path)?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload: DataResponse<Option<SecretData>> = Self::handle_response(response).await?;
        Ok(payload.data)
    }

    fn api_url(&self, path: &str) -> Result<Url, VaultError> {
        let mut url = self.base_url.join("/v1/")?;
        url.path_segments_mut()
            .map_err(|_| VaultError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path.trim_matches('/').split('/'));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, VaultError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(VaultError::Api { status, body })
        }
    }
}

// Older servers return mounts at the top level, newer ones also nest them
// under "data" next to request metadata.
fn parse_mounts(payload: &Value) -> Vec<Mount> {
    let table = payload
        .get("data")
        .and_then(Value::as_object)
        .or_else(|| payload.as_object());
    let Some(table) = table else {
        return Vec::new();
    };

    let mut mounts: Vec<Mount> = table
        .iter()
        .filter_map(|(path, entry)| {
            let entry: MountEntry = serde_json::from_value(entry.clone()).ok()?;
            let version = entry
                .options
                .as_ref()
                .and_then(|options| options.get("version"))
                .map(String::as_str);
            let kv_version = match (entry.kind.as_str(), version) {
                ("kv-v2", _) | ("kv", Some("2")) => Some(KvVersion::V2),
                ("kv", _) => Some(KvVersion::V1),
                _ => None,
            };
            Some(Mount {
                path: path.clone(),
                kind: entry.kind,
                kv_version,
            })
        })
        .collect();
    mounts.sort_by(|a, b| a.path.cmp(&b.path));
    mounts
}

#[derive(Debug, Deserialize)]
struct MountEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    options: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct KeyList {
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    auth: Option<LoginAuth>,
}

#[derive(Debug, Deserialize)]
struct LoginAuth {
    client_token: String,
}
