//! Storage layer
//!
//! One PostgreSQL pool for persisted state and one Redis pool for the
//! per-conversation mid counters.

use deadpool_redis::{Config as RedisPoolConfig, Pool as RedisPool, Runtime};
use ripple_common::{AppError, DatabaseConfig, RedisConfig};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Relay storage handles
#[derive(Clone)]
pub struct Storage {
    db: PgPool,
    redis: RedisPool,
}

impl Storage {
    /// Wrap existing pools
    #[must_use]
    pub fn new(db: PgPool, redis: RedisPool) -> Self {
        Self { db, redis }
    }

    /// Connect both pools from configuration
    pub async fn connect(
        database: &DatabaseConfig,
        redis: &RedisConfig,
    ) -> Result<Self, AppError> {
        let db = create_pg_pool(database).await?;
        let redis = create_redis_pool(redis)?;
        Ok(Self { db, redis })
    }

    /// The PostgreSQL pool
    #[must_use]
    pub fn db(&self) -> &PgPool {
        &self.db
    }

    /// The Redis pool
    #[must_use]
    pub fn redis(&self) -> &RedisPool {
        &self.redis
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("db_size", &self.db.size())
            .finish_non_exhaustive()
    }
}

/// Create the PostgreSQL connection pool
pub async fn create_pg_pool(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.url)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    tracing::info!(
        max_connections = config.max_connections,
        "PostgreSQL pool created"
    );
    Ok(pool)
}

/// Create the Redis connection pool
pub fn create_redis_pool(config: &RedisConfig) -> Result<RedisPool, AppError> {
    let pool = RedisPoolConfig::from_url(&config.url)
        .builder()
        .map_err(|e| AppError::Cache(e.to_string()))?
        .max_size(config.max_connections as usize)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| AppError::Cache(e.to_string()))?;

    tracing::info!(
        max_connections = config.max_connections,
        "Redis pool created"
    );
    Ok(pool)
}

/// Convert a SQLx error to an application error
pub fn map_db_error(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

/// Convert a Redis error to an application error
pub fn map_redis_error(e: impl std::fmt::Display) -> AppError {
    AppError::Cache(e.to_string())
}
