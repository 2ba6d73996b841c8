//! Service API traits
//!
//! The gateway dispatches through these traits rather than concrete HTTP
//! clients, so tests can drop in in-memory fakes.

use async_trait::async_trait;
use ripple_common::AppError;
use ripple_proto::rpc::{
    AccessDecision, EventsResponse, MemberInfo, QueryEventsParams, StoreEventResponse,
    StoredEventData, ValidationOutcome,
};
use ripple_proto::Event;

/// Relay operations the gateway depends on
#[async_trait]
pub trait RelayApi: Send + Sync {
    /// Persist an event; the relay assigns `mid` and `timestamp`
    async fn store_event(&self, event: &Event) -> Result<StoreEventResponse, AppError>;

    /// Fetch a single stored event by mid
    async fn get_event(&self, mid: i64) -> Result<StoredEventData, AppError>;

    /// Filtered range query, ascending by mid
    async fn query_events(&self, params: &QueryEventsParams) -> Result<EventsResponse, AppError>;

    /// Most recent `limit` events, ascending by mid
    async fn sync_events(&self, cid: &str, limit: u32) -> Result<EventsResponse, AppError>;

    /// Monotonic read-progress upsert
    async fn update_read_receipt(
        &self,
        cid: &str,
        uid: &str,
        last_read_mid: i64,
    ) -> Result<(), AppError>;

    /// Revoke policy check for a target message
    async fn validate_revoke(
        &self,
        cid: &str,
        uid: &str,
        target_mid: i64,
        is_admin: bool,
    ) -> Result<ValidationOutcome, AppError>;

    /// Edit policy check for a target message
    async fn validate_edit(
        &self,
        cid: &str,
        uid: &str,
        target_mid: i64,
    ) -> Result<ValidationOutcome, AppError>;
}

/// Directory operations the gateway depends on
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Authorization decision for `(uid, cid)`
    async fn check_access(&self, uid: &str, cid: &str) -> Result<AccessDecision, AppError>;

    /// Members of a conversation
    async fn conversation_members(&self, cid: &str) -> Result<Vec<MemberInfo>, AppError>;
}
