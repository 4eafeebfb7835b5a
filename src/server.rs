//! HTTP server for health checks, metrics and read-only state queries

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::identity::{ExchangeId, Instrument};
use crate::metadata::{AccountSnapshot, FeeSchedule};
use crate::orderbook::OrderBookSnapshot;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/books/:exchange/:base/:quote", get(get_book))
        .route("/fees/:exchange/:base/:quote", get(get_fee))
        .route("/accounts/:exchange", get(get_account))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the task is dropped or the listener fails
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "market-aggregator",
        "books": state.bookkeeper.len(),
        "exchanges": state.bookkeeper.exchanges(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics() -> Result<String, StatusCode> {
    use prometheus::{Encoder, TextEncoder};
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn parse_key(
    exchange: &str,
    base: &str,
    quote: &str,
) -> Result<(ExchangeId, Instrument), StatusCode> {
    let exchange = ExchangeId::from_str(exchange).map_err(|_| StatusCode::BAD_REQUEST)?;
    let instrument =
        Instrument::from_str(&format!("{base}/{quote}")).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((exchange, instrument))
}

async fn get_book(
    State(state): State<Arc<AppState>>,
    Path((exchange, base, quote)): Path<(String, String, String)>,
) -> Result<Json<OrderBookSnapshot>, StatusCode> {
    let (exchange, instrument) = parse_key(&exchange, &base, &quote)?;
    state
        .bookkeeper
        .get(exchange, &instrument)
        .map(|book| Json((*book).clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_fee(
    State(state): State<Arc<AppState>>,
    Path((exchange, base, quote)): Path<(String, String, String)>,
) -> Result<Json<FeeSchedule>, StatusCode> {
    let (exchange, instrument) = parse_key(&exchange, &base, &quote)?;
    state
        .metadata
        .get_fee(exchange, &instrument)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(exchange): Path<String>,
) -> Result<Json<AccountSnapshot>, StatusCode> {
    let exchange = ExchangeId::from_str(&exchange).map_err(|_| StatusCode::BAD_REQUEST)?;
    state
        .metadata
        .get_account_info(exchange)
        .map(|account| Json((*account).clone()))
        .ok_or(StatusCode::NOT_FOUND)
}
