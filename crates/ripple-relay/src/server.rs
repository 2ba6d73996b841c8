//! Relay server setup

use crate::rpc::{handle_rpc, RelayState};
use crate::service::EventService;
use crate::storage::Storage;
use axum::routing::{get, post};
use axum::Router;
use ripple_common::{AppConfig, AppError};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the relay router
pub fn create_router() -> Router<RelayState> {
    Router::new()
        .route("/api/rpc", post(handle_rpc))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: RelayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize storage and build the relay state
pub async fn create_relay_state(config: &AppConfig) -> Result<RelayState, AppError> {
    tracing::info!("connecting storage...");
    let storage = Storage::connect(&config.database, &config.redis).await?;

    let events = EventService::new(storage, config.relay.max_query_limit);
    Ok(RelayState::new(events))
}

/// Run the relay server
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .relay
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid relay address: {e}")))?;

    let state = create_relay_state(&config).await?;
    let app = create_app(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(addr = %addr, "relay listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("server error: {e}")))?;

    Ok(())
}
