//! # ripple-proto
//!
//! Wire protocol for the ripple realtime chat backend: the binary envelope
//! and event model carried over the realtime channel, conversation ids,
//! wire-stable error codes, and the JSON-RPC shapes used between services.
//! This crate has no infrastructure dependencies.

pub mod cid;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod event;
pub mod rpc;
pub mod tags;

// Re-export commonly used types at crate root
pub use cid::{Cid, CidError};
pub use codec::{decode_envelope, decode_event, encode_envelope, encode_event, CodecError};
pub use envelope::{
    AckBody, AuthBody, AuthResultBody, Command, Envelope, ErrorBody, SyncBody, PROTOCOL_VERSION,
    SERVER_SEQ,
};
pub use error::ErrorCode;
pub use event::{Event, EventBody, EventKind, EVENT_VERSION};
pub use tags::Tag;
