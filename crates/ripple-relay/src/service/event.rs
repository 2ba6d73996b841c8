//! Event service
//!
//! Persistence and ordered queries for conversation events, read receipts,
//! and reactions. The mid assigned by [`MidAllocator`] is written in the
//! same INSERT that persists the event, so a reader observing the row also
//! observes its mid.

use crate::models::{ReadReceipt, Reaction, StoredEvent};
use crate::service::mid::MidAllocator;
use crate::storage::{map_db_error, Storage};
use chrono::Utc;
use ripple_common::{AppError, AppResult};
use ripple_proto::rpc::{QueryEventsParams, StoreEventResponse};
use ripple_proto::Event;
use sqlx::QueryBuilder;
use std::collections::BTreeMap;

/// Fallback page size when the caller does not pass a limit
pub const DEFAULT_QUERY_LIMIT: u32 = 50;

/// Event persistence and query service
#[derive(Clone)]
pub struct EventService {
    storage: Storage,
    mids: MidAllocator,
    max_query_limit: u32,
}

impl EventService {
    #[must_use]
    pub fn new(storage: Storage, max_query_limit: u32) -> Self {
        Self {
            mids: MidAllocator::new(storage.clone()),
            storage,
            max_query_limit,
        }
    }

    fn clamp_limit(&self, limit: u32) -> i64 {
        let limit = if limit == 0 { DEFAULT_QUERY_LIMIT } else { limit };
        i64::from(limit.min(self.max_query_limit))
    }

    /// Persist an event, assigning its mid and timestamp
    ///
    /// The assigned mid is strictly increasing within the event's cid and is
    /// durable before this returns.
    pub async fn store_event(&self, event: &Event) -> AppResult<StoreEventResponse> {
        let cid = event.cid.as_str();
        let mid = self.mids.next(cid).await?;
        let timestamp = Utc::now().timestamp();

        let tags = serde_json::to_string(&event.tags)
            .map_err(|e| AppError::invalid_param(format!("unserializable tags: {e}")))?;
        let data = serde_json::to_string(&event.body.to_data())
            .map_err(|e| AppError::invalid_param(format!("unserializable data: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO events (mid, cid, kind, sender, tags, data, flags, sig, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(mid)
        .bind(cid)
        .bind(event.kind_code())
        .bind(&event.sender)
        .bind(&tags)
        .bind(&data)
        .bind(event.flags as i32)
        .bind(event.sig.as_deref())
        .bind(timestamp)
        .execute(self.storage.db())
        .await
        .map_err(map_db_error)?;

        tracing::debug!(
            cid = %cid,
            mid = mid,
            kind = event.kind_code(),
            sender = %event.sender,
            "event stored"
        );

        Ok(StoreEventResponse { mid, timestamp })
    }

    /// Fetch a single event by mid
    pub async fn get_event(&self, mid: i64) -> AppResult<StoredEvent> {
        sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT mid, cid, kind, sender, tags, data, flags, sig, timestamp, created_at
            FROM events
            WHERE mid = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(mid)
        .fetch_optional(self.storage.db())
        .await
        .map_err(map_db_error)?
        .ok_or(AppError::MessageNotFound(mid))
    }

    /// Filtered range query, ascending by mid
    ///
    /// All filters are conjunctive; the limit is clamped to the configured
    /// maximum.
    pub async fn query_events(&self, params: &QueryEventsParams) -> AppResult<Vec<StoredEvent>> {
        let mut query = QueryBuilder::new(
            "SELECT mid, cid, kind, sender, tags, data, flags, sig, timestamp, created_at \
             FROM events WHERE cid = ",
        );
        query.push_bind(&params.cid);

        if params.last_mid > 0 {
            query.push(" AND mid > ").push_bind(params.last_mid);
        }
        if params.before > 0 {
            query.push(" AND timestamp < ").push_bind(params.before);
        }
        if params.after > 0 {
            query.push(" AND timestamp > ").push_bind(params.after);
        }
        if !params.kinds.is_empty() {
            query.push(" AND kind = ANY(").push_bind(&params.kinds).push(")");
        }

        query
            .push(" ORDER BY mid ASC LIMIT ")
            .push_bind(self.clamp_limit(params.limit));

        query
            .build_query_as::<StoredEvent>()
            .fetch_all(self.storage.db())
            .await
            .map_err(map_db_error)
    }

    /// Most recent `limit` events of a conversation, ascending by mid
    pub async fn query_tail(&self, cid: &str, limit: u32) -> AppResult<Vec<StoredEvent>> {
        let mut events = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT mid, cid, kind, sender, tags, data, flags, sig, timestamp, created_at
            FROM events
            WHERE cid = $1
            ORDER BY mid DESC
            LIMIT $2
            "#,
        )
        .bind(cid)
        .bind(self.clamp_limit(limit))
        .fetch_all(self.storage.db())
        .await
        .map_err(map_db_error)?;

        events.reverse();
        Ok(events)
    }

    /// Upsert a read receipt; the stored value never regresses
    pub async fn update_read_receipt(
        &self,
        cid: &str,
        uid: &str,
        last_read_mid: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO read_receipts (cid, uid, last_read_mid, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (cid, uid) DO UPDATE
            SET last_read_mid = GREATEST(read_receipts.last_read_mid, EXCLUDED.last_read_mid),
                updated_at = NOW()
            "#,
        )
        .bind(cid)
        .bind(uid)
        .bind(last_read_mid)
        .execute(self.storage.db())
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    /// Read receipt of one user in one conversation
    pub async fn get_read_receipt(&self, cid: &str, uid: &str) -> AppResult<Option<ReadReceipt>> {
        sqlx::query_as::<_, ReadReceipt>(
            r#"
            SELECT cid, uid, last_read_mid, updated_at
            FROM read_receipts
            WHERE cid = $1 AND uid = $2
            "#,
        )
        .bind(cid)
        .bind(uid)
        .fetch_optional(self.storage.db())
        .await
        .map_err(map_db_error)
    }

    /// All read receipts of a conversation
    pub async fn conversation_read_receipts(&self, cid: &str) -> AppResult<Vec<ReadReceipt>> {
        sqlx::query_as::<_, ReadReceipt>(
            r#"
            SELECT cid, uid, last_read_mid, updated_at
            FROM read_receipts
            WHERE cid = $1
            "#,
        )
        .bind(cid)
        .fetch_all(self.storage.db())
        .await
        .map_err(map_db_error)
    }

    /// Record a reaction; idempotent per `(mid, uid, emoji)`
    pub async fn add_reaction(
        &self,
        mid: i64,
        cid: &str,
        uid: &str,
        emoji: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reactions (mid, cid, uid, emoji, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (mid, uid, emoji) DO NOTHING
            "#,
        )
        .bind(mid)
        .bind(cid)
        .bind(uid)
        .bind(emoji)
        .execute(self.storage.db())
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    /// Remove a reaction; idempotent
    pub async fn remove_reaction(&self, mid: i64, uid: &str, emoji: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM reactions
            WHERE mid = $1 AND uid = $2 AND emoji = $3
            "#,
        )
        .bind(mid)
        .bind(uid)
        .bind(emoji)
        .execute(self.storage.db())
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    /// All reactions on a message
    pub async fn reactions(&self, mid: i64) -> AppResult<Vec<Reaction>> {
        sqlx::query_as::<_, Reaction>(
            r#"
            SELECT mid, cid, uid, emoji, created_at
            FROM reactions
            WHERE mid = $1
            "#,
        )
        .bind(mid)
        .fetch_all(self.storage.db())
        .await
        .map_err(map_db_error)
    }

    /// Per-emoji reaction counts for a message
    pub async fn reaction_summary(&self, mid: i64) -> AppResult<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT emoji, COUNT(*) AS count
            FROM reactions
            WHERE mid = $1
            GROUP BY emoji
            "#,
        )
        .bind(mid)
        .fetch_all(self.storage.db())
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().collect())
    }
}

impl std::fmt::Debug for EventService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventService")
            .field("max_query_limit", &self.max_query_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EventService>();
    }
}
