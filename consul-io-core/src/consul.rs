use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ADDRESS: &str = "http://localhost:8500";
const TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, Error)]
pub enum ConsulError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("address cannot be used as a base url: {0}")]
    BaseUrl(String),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("value of key {key} is not valid base64: {source}")]
    Decode {
        key: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("write to key {0} was rejected")]
    Rejected(String),
}

/// Client for the Consul HTTP API, limited to the agent and KV endpoints.
#[derive(Clone)]
pub struct ConsulClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl ConsulClient {
    /// Builds a client without contacting the agent. Addresses without a
    /// scheme (`consul:8500`) are treated as plain HTTP.
    pub fn new(address: &str, token: Option<String>) -> Result<Self, ConsulError> {
        let address = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let base_url = Url::parse(&address)?;
        if base_url.cannot_be_a_base() {
            return Err(ConsulError::BaseUrl(address));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub async fn verify(&self) -> Result<AgentInfo, ConsulError> {
        let url = self.base_url.join("/v1/agent/self")?;
        let response = self.request(Method::GET, url).send().await?;
        Self::handle_response(response).await
    }

    /// Returns `None` when the key does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ConsulError> {
        let url = self.kv_url(key)?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let entries: Vec<KvEntry> = Self::handle_response(response).await?;
        match entries.into_iter().next() {
            Some(entry) => Ok(Some(entry.into_pair()?.value)),
            None => Ok(None),
        }
    }

    pub async fn put(&self, key: &str, value: &[u8]) -> Result<(), ConsulError> {
        let url = self.kv_url(key)?;
        let response = self
            .request(Method::PUT, url)
            .body(value.to_vec())
            .send()
            .await?;
        let accepted: bool = Self::handle_response(response).await?;
        if accepted {
            Ok(())
        } else {
            Err(ConsulError::Rejected(key.to_string()))
        }
    }

    /// Lists every entry under `prefix` recursively. An empty prefix lists
    /// the whole store.
    pub async fn list(&self, prefix: &str) -> Result<Vec<KvPair>, ConsulError> {
        let mut url = self.kv_url(prefix)?;
        url.query_pairs_mut().append_pair("recurse", "true");
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let entries: Vec<KvEntry> = Self::handle_response(response).await?;
        entries.into_iter().map(KvEntry::into_pair).collect()
    }

    fn kv_url(&self, key: &str) -> Result<Url, ConsulError> {
        let mut url = self.base_url.join("/v1/kv/")?;
        url.path_segments_mut()
            .map_err(|_| ConsulError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(key.trim_start_matches('/').split('/'));
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
    ) -> Result<T, ConsulError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ConsulError::Api { status, body })
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentInfo {
    #[serde(rename = "Config", default)]
    pub config: AgentConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub node_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: Vec<u8>,
    pub modify_index: u64,
}

impl KvPair {
    /// Consul marks folders with a trailing slash and no value.
    pub fn is_dir(&self) -> bool {
        self.key.ends_with('/')
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvEntry {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    modify_index: u64,
}

impl KvEntry {
    fn into_pair(self) -> Result<KvPair, ConsulError> {
        let value = match self.value.as_deref() {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map_err(|source| ConsulError::Decode {
                    key: self.key.clone(),
                    source,
                })?,
            None => Vec::new(),
        };
        Ok(KvPair {
            key: self.key,
            value,
            modify_index: self.modify_index,
        })
    }
}
