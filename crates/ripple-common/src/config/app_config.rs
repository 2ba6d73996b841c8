//! Application configuration structs
//!
//! Loads configuration from environment variables (optionally seeded from a
//! dotenv file selected on the command line, see [`super::CliArgs`]).

use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub relay: RelayConfig,
    pub directory: DirectoryConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Maximum simultaneous connections per user; 0 disables the bound
    #[serde(default = "default_max_conn_per_user")]
    pub max_conn_per_user: usize,
    /// Seconds without traffic before a connection is considered dead
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout: u64,
    /// Per-frame read deadline in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    /// Per-frame write deadline in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
    /// Base URL of the relay service
    pub relay_addr: String,
    /// Base URL of the directory service
    pub directory_addr: String,
}

impl GatewayConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Relay service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Hard cap applied to every event query
    #[serde(default = "default_max_query_limit")]
    pub max_query_limit: u32,
}

impl RelayConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Directory service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl DirectoryConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// Token lifetime in seconds
    #[serde(default = "default_token_expiry")]
    pub token_expiry: i64,
}

// Default value functions
fn default_app_name() -> String {
    "ripple".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_conn_per_user() -> usize {
    5
}

fn default_heartbeat_timeout() -> u64 {
    60
}

fn default_read_timeout() -> u64 {
    90
}

fn default_write_timeout() -> u64 {
    10
}

fn default_max_query_limit() -> u32 {
    200
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_redis_max_connections() -> u32 {
    16
}

fn default_token_expiry() -> i64 {
    86_400 // 24 hours
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn required_port(name: &'static str) -> Result<u16, ConfigError> {
    required(name)?
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name, env::var(name).unwrap_or_default()))
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway_port = required_port("GATEWAY_PORT")?;
        let relay_port = required_port("RELAY_PORT")?;
        let directory_port = required_port("DIRECTORY_PORT")?;

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: GatewayConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: gateway_port,
                ws_path: env::var("GATEWAY_WS_PATH").unwrap_or_else(|_| default_ws_path()),
                max_conn_per_user: parsed_or("GATEWAY_MAX_CONN_PER_USER", default_max_conn_per_user()),
                heartbeat_timeout: parsed_or("GATEWAY_HEARTBEAT_TIMEOUT", default_heartbeat_timeout()),
                read_timeout: parsed_or("GATEWAY_READ_TIMEOUT", default_read_timeout()),
                write_timeout: parsed_or("GATEWAY_WRITE_TIMEOUT", default_write_timeout()),
                relay_addr: env::var("RELAY_ADDR")
                    .unwrap_or_else(|_| format!("http://127.0.0.1:{relay_port}")),
                directory_addr: env::var("DIRECTORY_ADDR")
                    .unwrap_or_else(|_| format!("http://127.0.0.1:{directory_port}")),
            },
            relay: RelayConfig {
                host: env::var("RELAY_HOST").unwrap_or_else(|_| default_host()),
                port: relay_port,
                max_query_limit: parsed_or("RELAY_MAX_QUERY_LIMIT", default_max_query_limit()),
            },
            directory: DirectoryConfig {
                host: env::var("DIRECTORY_HOST").unwrap_or_else(|_| default_host()),
                port: directory_port,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", default_max_connections()),
                min_connections: parsed_or("DATABASE_MIN_CONNECTIONS", default_min_connections()),
            },
            redis: RedisConfig {
                url: required("REDIS_URL")?,
                max_connections: parsed_or("REDIS_MAX_CONNECTIONS", default_redis_max_connections()),
            },
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
                token_expiry: parsed_or("JWT_TOKEN_EXPIRY", default_token_expiry()),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("config file not found: {0}")]
    FileNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment() {
        assert!(Environment::Production.is_production());
        assert!(!Environment::Development.is_production());
        assert!(Environment::Development.is_development());
    }

    #[test]
    fn test_addresses() {
        let config = RelayConfig {
            host: "0.0.0.0".to_string(),
            port: 8100,
            max_query_limit: 200,
        };
        assert_eq!(config.address(), "0.0.0.0:8100");
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_app_name(), "ripple");
        assert_eq!(default_ws_path(), "/ws");
        assert_eq!(default_max_conn_per_user(), 5);
        assert_eq!(default_heartbeat_timeout(), 60);
        assert_eq!(default_max_query_limit(), 200);
        assert_eq!(default_token_expiry(), 86_400);
    }
}
