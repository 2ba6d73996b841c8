//! # ripple-client
//!
//! Typed JSON-RPC 2.0 clients for the relay and directory services, plus the
//! [`RelayApi`] and [`DirectoryApi`] traits the gateway dispatches through.

pub mod api;
pub mod directory;
pub mod relay;
pub mod rpc;

pub use api::{DirectoryApi, RelayApi};
pub use directory::DirectoryClient;
pub use relay::RelayClient;
pub use rpc::{RpcClient, RPC_TIMEOUT};
