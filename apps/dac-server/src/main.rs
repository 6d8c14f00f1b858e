mod config;
mod logging;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use permissions::PermissionsModule;
use permissions::domain::store::PermissionStore;
use permissions::infra::storage::{InMemoryPermissionStore, SeaOrmPermissionStore, connect};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use config::{AppConfig, CliOverrides, redact_dsn_password};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// DAC server - three-layer permission resolution over HTTP
#[derive(Parser)]
#[command(name = "dac-server")]
#[command(about = "DAC server - three-layer permission resolution over HTTP")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Keep grants in process memory instead of the configured database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) defaults -> 2) YAML (if provided) -> 3) env (DAC__*) -> 4) CLI overrides
    let mut config = AppConfig::load_layered(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        port: cli.port,
        verbose: cli.verbose,
    });

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_yaml()?);
        return Ok(());
    }

    let _log_guard = logging::init_logging(&config.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "DAC server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, cli.mock).await,
        Commands::Check => check_config(&config),
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn open_store(config: &AppConfig, mock: bool) -> Result<Arc<dyn PermissionStore>> {
    if mock {
        tracing::info!("Mock mode enabled: grants are kept in memory");
        return Ok(Arc::new(InMemoryPermissionStore::new()));
    }
    let dsn = redact_dsn_password(&config.database.dsn)?;
    tracing::info!(%dsn, "Connecting to permission store");
    let db = connect(&config.database.dsn)
        .await
        .with_context(|| format!("failed to open permission store at {dsn}"))?;
    Ok(Arc::new(SeaOrmPermissionStore::new(db)))
}

async fn run_server(config: AppConfig, mock: bool) -> Result<()> {
    let store = open_store(&config, mock).await?;
    let module = PermissionsModule::builder(store)
        .config(config.permissions)
        .groups(config.groups)
        .build();

    let router = module.router().layer(TraceLayer::new_for_http());

    let cancel = CancellationToken::new();
    let cancel_for_signals = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = shutdown::wait_for_shutdown().await {
            tracing::warn!(
                error = %e,
                "shutdown: primary waiter failed, falling back to ctrl_c()"
            );
            tokio::signal::ctrl_c().await.ok();
        }
        cancel_for_signals.cancel();
    });

    let addr = config.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "HTTP server bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        })
        .await
        .context("HTTP server failed")
}
