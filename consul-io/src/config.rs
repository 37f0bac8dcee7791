use std::path::PathBuf;
use std::time::Duration;

use consul_io_core::{ConsulClient, ConsulError};
use thiserror::Error;
use tracing::warn;

use crate::cli::GlobalArgs;
use crate::sync::scan::DEFAULT_MARKERS;
use crate::sync::{IgnoreList, SensitiveScanner};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("invalid consul address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: ConsulError,
    },
}

/// Settings for one import or export run, built once from the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub consul_addr: String,
    pub token: Option<String>,
    pub rate_limit: Duration,
    pub retry_limit: i64,
    pub concurrency: usize,
    pub ignore: IgnoreList,
    pub findings_log: PathBuf,
    pub markers: Vec<String>,
}

impl RunConfig {
    /// Settings shared by every command. The consul address is checked when
    /// [`RunConfig::client`] builds the client.
    pub fn from_args(args: &GlobalArgs, ignore: Vec<String>) -> Self {
        if args.retry_limit <= 0 {
            warn!(
                "--retry-limit is {}, no remote operation will be attempted",
                args.retry_limit
            );
        }
        let markers = if args.sensitive_keys.is_empty() {
            DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect()
        } else {
            args.sensitive_keys.clone()
        };

        Self {
            consul_addr: args.consul_addr.clone(),
            token: args.token.clone().filter(|t| !t.is_empty()),
            rate_limit: Duration::from_millis(args.rate_limit),
            retry_limit: args.retry_limit,
            concurrency: args.concurrency,
            ignore: IgnoreList::new(ignore),
            findings_log: args.findings_log.clone(),
            markers,
        }
    }

    /// Like [`RunConfig::from_args`], additionally requiring a usable upload
    /// concurrency.
    pub fn for_import(args: &GlobalArgs, ignore: Vec<String>) -> Result<Self, ConfigError> {
        if args.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(Self::from_args(args, ignore))
    }

    /// Builds a client without contacting the agent.
    pub fn client(&self) -> Result<ConsulClient, ConfigError> {
        ConsulClient::new(&self.consul_addr, self.token.clone()).map_err(|source| {
            ConfigError::Address {
                address: self.consul_addr.clone(),
                source,
            }
        })
    }

    pub fn scanner(&self) -> SensitiveScanner {
        SensitiveScanner::new(self.markers.iter().cloned())
    }
}
