//! Storage models
//!
//! Rows as they live in PostgreSQL. Tags and data are opaque JSON blobs at
//! this layer; the relay orders and filters but never interprets them.

use chrono::{DateTime, Utc};
use ripple_proto::rpc::{ReadReceiptData, StoredEventData};

/// A persisted event
///
/// `mid` is unique; `(cid, mid)` carries the per-conversation order.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredEvent {
    pub mid: i64,
    pub cid: String,
    pub kind: i32,
    pub sender: String,
    pub tags: String,
    pub data: String,
    pub flags: i32,
    pub sig: Option<String>,
    /// Seconds since epoch, assigned at persistence time
    pub timestamp: i64,
    pub created_at: DateTime<Utc>,
}

impl From<StoredEvent> for StoredEventData {
    fn from(row: StoredEvent) -> Self {
        Self {
            mid: row.mid,
            cid: row.cid,
            kind: row.kind,
            sender: row.sender,
            tags: row.tags,
            data: row.data,
            flags: row.flags,
            sig: row.sig,
            timestamp: row.timestamp,
        }
    }
}

/// Read progress of one user in one conversation
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ReadReceipt {
    pub cid: String,
    pub uid: String,
    pub last_read_mid: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<ReadReceipt> for ReadReceiptData {
    fn from(row: ReadReceipt) -> Self {
        Self {
            cid: row.cid,
            uid: row.uid,
            last_read_mid: row.last_read_mid,
        }
    }
}

/// One user's emoji reaction on one message
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Reaction {
    pub mid: i64,
    pub cid: String,
    pub uid: String,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}
