//! Per-conversation mid allocation
//!
//! Each conversation has an independent counter in Redis (`mid:<cid>`).
//! Counters are strictly increasing and never reused. A missing counter key
//! is seeded from the highest persisted mid before the first increment, so a
//! cache flush cannot reissue a mid that is already on disk.

use crate::storage::{map_db_error, map_redis_error, Storage};
use redis::AsyncCommands;
use ripple_common::AppResult;

fn counter_key(cid: &str) -> String {
    format!("mid:{cid}")
}

/// Allocator of strictly increasing per-cid mids
#[derive(Clone)]
pub struct MidAllocator {
    storage: Storage,
}

impl MidAllocator {
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Allocate the next mid for a conversation
    ///
    /// A gap appears if the caller increments but fails to persist; readers
    /// never assume dense mids, so gaps are harmless.
    pub async fn next(&self, cid: &str) -> AppResult<i64> {
        let key = counter_key(cid);
        let mut conn = self
            .storage
            .redis()
            .get()
            .await
            .map_err(map_redis_error)?;

        let exists: bool = conn.exists(&key).await.map_err(map_redis_error)?;
        if !exists {
            let seed = self.max_persisted_mid(cid).await?;
            // SET NX: a concurrent seeder winning the race is fine, both
            // observed the same persisted maximum.
            let _: bool = conn.set_nx(&key, seed).await.map_err(map_redis_error)?;
            tracing::info!(cid = %cid, seed = seed, "seeded mid counter");
        }

        let mid: i64 = conn.incr(&key, 1).await.map_err(map_redis_error)?;
        Ok(mid)
    }

    async fn max_persisted_mid(&self, cid: &str) -> AppResult<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(mid) FROM events WHERE cid = $1")
            .bind(cid)
            .fetch_one(self.storage.db())
            .await
            .map_err(map_db_error)?;
        Ok(max.unwrap_or(0))
    }
}

impl std::fmt::Debug for MidAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidAllocator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_key() {
        assert_eq!(counter_key("d:alice:bob"), "mid:d:alice:bob");
        assert_eq!(counter_key("g:team"), "mid:g:team");
    }

    #[test]
    fn test_allocator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MidAllocator>();
    }
}
