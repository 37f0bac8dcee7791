use std::io;
use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::Command;
use tracing::info;

const PACKAGE: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to start cargo: {0}")]
    Spawn(#[from] io::Error),
    #[error("cargo install exited with {0}")]
    Failed(ExitStatus),
}

fn install_args(git: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        "--locked".to_string(),
        "--force".to_string(),
    ];
    if let Some(git) = git {
        args.push("--git".to_string());
        args.push(git.to_string());
    }
    args.push(PACKAGE.to_string());
    args
}

/// Reinstalls the binary through `cargo install`, streaming cargo's output.
pub async fn run(git: Option<&str>) -> Result<(), UpdateError> {
    let args = install_args(git);
    info!("Running cargo {}", args.join(" "));
    let status = Command::new("cargo").args(&args).status().await?;
    if !status.success() {
        return Err(UpdateError::Failed(status));
    }
    info!("Update completed.");
    Ok(())
}
