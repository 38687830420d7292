use anyhow::{Context, Result};
use oracle::SqlReferenceOracle;
use router::{AppState, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = common::config::Configuration::load().context("Failed to load configuration")?;
    common::cli::utils::validate_config(&config)?;

    log::info!("Starting Upload-Admin");

    let oracle = SqlReferenceOracle::new(
        &config.database.dsn,
        config.references.clone(),
        config.admin.request_timeout,
    )
    .await
    .context("Failed to connect to reference database")?;

    let state = AppState::new(config, Arc::new(oracle))
        .context("Failed to initialize application state")?;

    let app = create_router(state);
    let http_addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let http_handle = tokio::spawn(async move {
        log::info!("Starting HTTP server on {http_addr}");
        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .expect("Failed to bind HTTP server");
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
                log::info!("HTTP server shutting down gracefully");
            })
            .await
            .expect("HTTP server error");
    });

    log::info!("HTTP API server listening on {http_addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c signal")?;

    log::info!("Shutting down...");
    let _ = shutdown_tx.send(());
    let _ = http_handle.await;

    log::info!("Upload-Admin stopped gracefully");

    Ok(())
}
