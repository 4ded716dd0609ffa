use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use hotel_tax_api::config::{Cli, ServerConfig};
use hotel_tax_api::{AppState, app, build_registry, logging};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_default_logging();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli)?;

    if std::env::var_os("RUST_LOG").is_none() {
        logging::set_log_level(&config.log_level)?;
    }
    if let Some(path) = &config.log_file {
        logging::enable_file_logging(path)?;
    }
    tracing::debug!(?config, "Loaded configuration");

    let registry = build_registry(config.seeds_dir.clone());
    let repo = registry
        .create(&config.database)
        .await
        .with_context(|| format!("cannot open {} database", config.database.backend))?;

    let mut state = AppState::new(Arc::from(repo));
    match &config.auth_token {
        Some(token) => state = state.with_auth_token(token.as_str()),
        None => warn!("No bearer token configured; the API is open to any caller"),
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.bind))?;
    info!(addr = %config.bind, backend = %config.database.backend, "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
