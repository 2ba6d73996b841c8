//! # ripple-gateway
//!
//! Realtime gateway: terminates client WebSocket connections, maintains the
//! connection hub and subscription sets, and dispatches every inbound frame
//! through authorize → persist → fan-out.

pub mod connection;
pub mod dispatch;
pub mod hub;
pub mod server;

pub use connection::{Conn, ConnState, SEND_QUEUE_SIZE};
pub use dispatch::{Dispatcher, RPC_DEADLINE};
pub use hub::Hub;
pub use server::{run, GatewayState, MAX_FRAME_BYTES};
