//! Configuration loading

mod app_config;
mod cli;

pub use app_config::{
    AppConfig, AppSettings, ConfigError, DatabaseConfig, DirectoryConfig, Environment,
    GatewayConfig, JwtConfig, RedisConfig, RelayConfig,
};
pub use cli::CliArgs;
