use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use consul_io_core::{AuthMethod, DEFAULT_ADDRESS, KvVersion};

#[derive(Debug, Parser)]
#[command(
    name = "consul-io",
    version,
    about = "Import and export configuration files to and from the Consul KV store"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Consul agent address
    #[arg(long, global = true, env = "CONSUL_HTTP_ADDR", default_value = DEFAULT_ADDRESS)]
    pub consul_addr: String,
    /// ACL token sent with every Consul request
    #[arg(long, global = true, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Minimum spacing between remote operations and between retries
    #[arg(long, global = true, value_name = "MS", default_value_t = 500)]
    pub rate_limit: u64,
    /// Attempts per remote operation
    #[arg(long, global = true, default_value_t = 5, allow_negative_numbers = true)]
    pub retry_limit: i64,
    /// Files uploaded in parallel
    #[arg(long, global = true, default_value_t = 10)]
    pub concurrency: usize,
    /// File that collects sensitive-content findings
    #[arg(long, global = true, value_name = "PATH", default_value = "problems.txt")]
    pub findings_log: PathBuf,
    /// Sensitive marker to look for; replaces the default Password and Token
    #[arg(long = "sensitive-key", global = true, value_name = "MARKER")]
    pub sensitive_keys: Vec<String>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload every file under a directory to Consul KV
    Import(ImportArgs),
    /// Write every Consul KV entry into a directory
    Export(ExportArgs),
    /// Search string values of Vault KV secrets
    #[command(name = "vault-search", visible_alias = "search")]
    VaultSearch(SearchArgs),
    /// Print the version
    Version,
    /// Reinstall the latest release with cargo
    Update(UpdateArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    pub directory: PathBuf,
    /// Path prefix to skip; repeat or separate with commas
    #[arg(long, value_delimiter = ',')]
    pub ignore: Vec<String>,
    /// Exit non-zero when any file failed to upload
    #[arg(long)]
    pub fail_on_error: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthType {
    Ldap,
    Userpass,
}

impl From<AuthType> for AuthMethod {
    fn from(value: AuthType) -> Self {
        match value {
            AuthType::Ldap => AuthMethod::Ldap,
            AuthType::Userpass => AuthMethod::Userpass,
        }
    }
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Case-insensitive text to look for in secret values
    pub term: String,
    #[arg(long, env = "VAULT_ADDR", default_value = "http://127.0.0.1:8200")]
    pub vault_addr: String,
    /// Secret path to search, such as `kv/app`; all KV mounts when omitted
    #[arg(long)]
    pub path: Option<String>,
    /// KV engine version used with --path
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub kv_version: u8,
    #[arg(long, env = "VAULT_USERNAME")]
    pub username: Option<String>,
    #[arg(long, env = "VAULT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(long, value_enum, default_value_t = AuthType::Ldap)]
    pub auth_type: AuthType,
    /// Use an existing token instead of logging in
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: Option<String>,
}

impl SearchArgs {
    pub fn kv_version(&self) -> KvVersion {
        if self.kv_version == 1 {
            KvVersion::V1
        } else {
            KvVersion::V2
        }
    }
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Install from this git repository instead of crates.io
    #[arg(long)]
    pub git: Option<String>,
}
