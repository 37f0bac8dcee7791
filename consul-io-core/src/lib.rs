mod consul;
mod vault;

pub use consul::{
    AgentConfig, AgentInfo, ConsulClient, ConsulError, DEFAULT_ADDRESS, KvPair,
};
pub use reqwest::StatusCode;
pub use vault::{AuthMethod, KvVersion, Mount, SecretData, TokenInfo, VaultClient, VaultError};
