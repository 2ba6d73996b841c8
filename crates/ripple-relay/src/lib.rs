//! # ripple-relay
//!
//! Event persistence service: assigns monotonic per-conversation mids,
//! persists events, answers ordered queries, and enforces the revoke/edit
//! time-window policies.

pub mod models;
pub mod rpc;
pub mod server;
pub mod service;
pub mod storage;
pub mod validation;

pub use models::{ReadReceipt, Reaction, StoredEvent};
pub use rpc::RelayState;
pub use server::run;
pub use service::{EventService, MidAllocator, DEFAULT_QUERY_LIMIT};
pub use storage::Storage;
pub use validation::{check_edit, check_revoke, EDIT_WINDOW_SECS, REVOKE_WINDOW_SECS};
