use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use oracle::SqlReferenceOracle;
use router::{AppState, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Parser)]
#[command(name = "upload-admin-router")]
#[command(about = "Upload-Admin Router Service - serves the storage reconciliation HTTP API")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<RouterCommands>,

    #[arg(long, help = "HTTP API server port", default_value = "3000")]
    http_port: u16,

    #[arg(long, help = "Bind address for the server", default_value = "0.0.0.0")]
    bind: String,
}

#[derive(Subcommand)]
enum RouterCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for RouterCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    // Load application configuration
    let config = utils::load_config(cli.common.config.as_ref())?;

    // Handle common commands that don't require starting the service
    let command = cli.command.unwrap_or_default();
    let RouterCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config)? {
        return Ok(()); // Command handled, exit early
    }

    utils::validate_config(&config)?;

    log::info!("Starting Upload-Admin Router Service");

    let bind_ip = cli
        .bind
        .parse::<std::net::IpAddr>()
        .context("Invalid bind address")?;
    let http_addr = SocketAddr::new(bind_ip, cli.http_port);

    // Connect to the system of record before accepting traffic
    let oracle = SqlReferenceOracle::new(
        &config.database.dsn,
        config.references.clone(),
        config.admin.request_timeout,
    )
    .await
    .context("Failed to connect to reference database")?;

    let state = AppState::new(config, Arc::new(oracle))
        .context("Failed to initialize router state")?;

    let app = create_router(state);
    let (http_shutdown_tx, http_shutdown_rx) = oneshot::channel::<()>();
    let http_handle = tokio::spawn(async move {
        log::info!("Starting HTTP router on {http_addr}");
        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .expect("Failed to bind HTTP router");
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                http_shutdown_rx.await.ok();
                log::info!("HTTP router shutting down gracefully");
            })
            .await
            .expect("HTTP router error");
    });

    log::info!("HTTP API server listening on {http_addr}");

    // Wait for ctrl+c
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c signal")?;

    log::info!("Shutting down router service...");

    // Signal HTTP router to shutdown gracefully
    let _ = http_shutdown_tx.send(());
    let _ = http_handle.await;

    log::info!("Router service stopped gracefully");

    Ok(())
}
