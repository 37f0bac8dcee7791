use anyhow::Context;
use clap::Parser;
use consul_io::cli::{Cli, Command};
use consul_io::config::RunConfig;
use consul_io::sync::{ConsulConnector, FindingsLog};
use consul_io::{export, import, logging, search, update};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_tracing(cli.global.verbose);

    match cli.command {
        Command::Import(args) => {
            let config = RunConfig::for_import(&cli.global, args.ignore)?;
            let connector = ConsulConnector::new(config.client()?);
            let summary = import::run(&config, &args.directory, connector, shutdown_token())
                .await
                .with_context(|| format!("import of {} failed", args.directory.display()))?;
            if summary.cancelled {
                warn!("Import interrupted after {} files", summary.dispatched());
            } else {
                info!("Import process completed successfully.");
            }
            if args.fail_on_error && summary.has_failures() {
                anyhow::bail!("{} of {} files failed to upload", summary.failed, summary.dispatched());
            }
        }
        Command::Export(args) => {
            let config = RunConfig::from_args(&cli.global, Vec::new());
            let client = config.client()?;
            let findings = FindingsLog::new(&config.findings_log);
            let summary = export::run(&client, &args.directory, &config.scanner(), &findings).await?;
            info!(
                files = summary.files,
                directories = summary.directories,
                failed = summary.failed,
                "Export process completed successfully."
            );
        }
        Command::VaultSearch(args) => {
            let client = search::authenticate(&args).await?;
            let hits =
                search::search(&client, &args.term, args.path.as_deref(), args.kv_version()).await?;
            for hit in &hits {
                println!("{}", hit.render());
            }
            info!("{} matching secrets", hits.len());
        }
        Command::Version => {
            println!("Consul IO CLI version {}", env!("CARGO_PKG_VERSION"));
        }
        Command::Update(args) => update::run(args.git.as_deref()).await?,
    }
    Ok(())
}

/// Cancelled on the first Ctrl-C; in-flight uploads finish, nothing new starts.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for in-flight uploads");
            cancel.cancel();
        }
    });
    token
}
