//! Gateway server setup

mod handler;
mod state;

pub use handler::{ws_handler, MAX_FRAME_BYTES};
pub use state::GatewayState;

use crate::dispatch::Dispatcher;
use crate::hub::Hub;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ripple_client::{DirectoryClient, RelayClient};
use ripple_common::{AppConfig, AppError, JwtService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
///
/// The WebSocket path comes from configuration; `/health` and `/api/stats`
/// are fixed.
pub fn create_router(ws_path: &str) -> Router<GatewayState> {
    Router::new()
        .route(ws_path, get(ws_handler))
        .route("/health", get(health_check))
        .route("/api/stats", get(stats))
}

async fn health_check() -> &'static str {
    "OK"
}

/// Connection counters for operators
async fn stats(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "online_users": state.hub().online_users(),
        "total_conns": state.hub().total_conns(),
    }))
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router(&state.config().gateway.ws_path.clone())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire up the hub, RPC clients, and dispatcher
#[must_use]
pub fn create_gateway_state(config: AppConfig) -> GatewayState {
    let hub = Hub::spawn(config.gateway.max_conn_per_user);

    let relay = Arc::new(RelayClient::new(&config.gateway.relay_addr));
    let directory = Arc::new(DirectoryClient::new(&config.gateway.directory_addr));
    let dispatcher = Arc::new(Dispatcher::new(hub.clone(), relay, directory));

    let jwt = Arc::new(JwtService::new(&config.jwt.secret, config.jwt.token_expiry));

    GatewayState::new(hub, dispatcher, jwt, config)
}

/// Run the gateway server
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid gateway address: {e}")))?;
    let ws_path = config.gateway.ws_path.clone();

    let state = create_gateway_state(config);
    let app = create_app(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(addr = %addr, path = %ws_path, "gateway listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("server error: {e}")))?;

    Ok(())
}
