//! Directory server setup

use crate::rpc::{handle_rpc, DirectoryState};
use crate::service::ConversationService;
use axum::routing::{get, post};
use axum::Router;
use ripple_common::{AppConfig, AppError, JwtService};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the directory router
pub fn create_router() -> Router<DirectoryState> {
    Router::new()
        .route("/api/rpc", post(handle_rpc))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: DirectoryState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Connect the database pool
pub async fn create_pool(config: &AppConfig) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database.url)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run the directory server
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .directory
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid directory address: {e}")))?;

    let pool = create_pool(&config).await?;
    let jwt = JwtService::new(&config.jwt.secret, config.jwt.token_expiry);
    let state = DirectoryState::new(ConversationService::new(pool), jwt);
    let app = create_app(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(addr = %addr, "directory listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("server error: {e}")))?;

    Ok(())
}
