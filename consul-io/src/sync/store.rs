use async_trait::async_trait;
use consul_io_core::{ConsulClient, ConsulError};

/// The subset of a key-value store the upload pipeline needs.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ConsulError>;
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), ConsulError>;
}

/// Opens a store session. Called once per upload task.
#[async_trait]
pub trait KvConnector: Send + Sync + 'static {
    type Store: KvStore;

    async fn connect(&self) -> Result<Self::Store, ConsulError>;
}

#[async_trait]
impl KvStore for ConsulClient {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ConsulError> {
        ConsulClient::get(self, key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), ConsulError> {
        ConsulClient::put(self, key, value).await
    }
}

/// Hands out clones of one client, checking the ACL token against the agent
/// before each task uses it.
#[derive(Clone)]
pub struct ConsulConnector {
    client: ConsulClient,
}

impl ConsulConnector {
    pub fn new(client: ConsulClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KvConnector for ConsulConnector {
    type Store = ConsulClient;

    async fn connect(&self) -> Result<ConsulClient, ConsulError> {
        self.client.verify().await?;
        Ok(self.client.clone())
    }
}
