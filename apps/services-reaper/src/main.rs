use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use services_registry::{ServicesRegistryConfig, ServicesRegistryModule};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Services Reaper - removes services that stopped sending heartbeats
#[derive(Parser)]
#[command(name = "services-reaper")]
#[command(about = "Removes dead services from the services registry")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (JSON, secrets redacted) and exit
    #[arg(long)]
    print_config: bool,

    /// Run a single reaper pass and exit
    #[arg(long)]
    once: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reap dead services on the configured interval
    Run,
    /// Validate configuration, connect and report signature health
    Check,
    /// Re-sign rows still signed with a previous key
    Resign,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.config.as_deref()
        && !Path::new(path).is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    init_logging(cli.verbose);

    // defaults -> YAML (if provided) -> env (SERVICES_REGISTRY__*)
    let config = ServicesRegistryConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let module = ServicesRegistryModule::init(config).await?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run if cli.once => run_once(&module).await,
        Commands::Run => run_until_shutdown(&module).await,
        Commands::Check => check(&module).await,
        Commands::Resign => resign(&module).await,
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn run_once(module: &ServicesRegistryModule) -> Result<()> {
    let report = module.reaper().run_once().await?;
    tracing::info!(
        scanned = report.scanned,
        reaped = report.reaped,
        skipped = report.skipped,
        failed = report.failed,
        "Reaper pass complete"
    );
    if report.failed > 0 {
        anyhow::bail!("{} dead services could not be reaped", report.failed);
    }
    Ok(())
}

async fn run_until_shutdown(module: &ServicesRegistryModule) -> Result<()> {
    let reaper = module.reaper();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { reaper.run(&cancel).await }
    });

    tracing::info!(
        interval_secs = module.config().reaper.interval_secs,
        dead_after_secs = module.config().reaper.dead_after_secs,
        "Services reaper started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    tracing::info!("Shutdown signal received, stopping reaper");

    cancel.cancel();
    handle.await.context("reaper task panicked")?;
    Ok(())
}

async fn check(module: &ServicesRegistryModule) -> Result<()> {
    tracing::info!("Checking services registry...");
    let audit = module.service().audit_signatures().await?;
    tracing::info!(
        total = audit.total,
        trusted = audit.trusted,
        corrupted = audit.total - audit.trusted,
        stale_key = audit.stale_key,
        "Signature audit complete"
    );
    if audit.trusted < audit.total {
        anyhow::bail!(
            "{} service records failed signature verification",
            audit.total - audit.trusted
        );
    }
    Ok(())
}

async fn resign(module: &ServicesRegistryModule) -> Result<()> {
    let count = module.service().resign_stale().await?;
    tracing::info!(count, "Re-signed services with the primary key");
    Ok(())
}
