//! Market Aggregator
//!
//! Aggregates order books, fees and balances from several exchanges and
//! serves the combined state over HTTP.

use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_aggregator::{AppState, Config, ConnectorSet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting Market Aggregator");

    // Load configuration
    let config = Config::load()?;
    info!(enabled = ?config.enabled_exchanges(), "Configuration loaded");

    let state = Arc::new(AppState::new(config));
    state
        .buffer
        .metrics()
        .register(prometheus::default_registry())?;

    // Venue adapters register here
    let connectors = ConnectorSet::new();
    if connectors.is_empty() {
        warn!("No connectors registered; serving an empty view");
    }
    let handles = connectors.start(&state.config, &state.metadata, &state.buffer);
    info!(tasks = handles.len(), "Connectors started");

    let server_state = state.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = market_aggregator::server::serve(server_state).await {
            warn!(error = %e, "HTTP server error");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    for handle in handles {
        handle.unsubscribe().await;
    }
    server.abort();

    info!("Market Aggregator stopped");
    Ok(())
}
