//! # ripple-directory
//!
//! Conversation membership service and authorization source of truth.
//! Answers `seaking.*` RPC calls from the gateway and bootstraps the
//! database schema for the whole backend.

pub mod migrate;
pub mod models;
pub mod rpc;
pub mod server;
pub mod service;

pub use migrate::run_migrations;
pub use models::{Conversation, ConversationMember, CONV_TYPE_DIRECT, CONV_TYPE_GROUP};
pub use rpc::DirectoryState;
pub use server::run;
pub use service::ConversationService;
