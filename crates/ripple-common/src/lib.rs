//! # ripple-common
//!
//! Shared utilities for the ripple services: configuration, error handling,
//! session authentication, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{Claims, JwtService};
pub use config::{
    AppConfig, AppSettings, CliArgs, ConfigError, DatabaseConfig, DirectoryConfig, Environment,
    GatewayConfig, JwtConfig, RedisConfig, RelayConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
