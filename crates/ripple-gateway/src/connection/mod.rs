//! Connection types

mod conn;

pub use conn::{Conn, ConnState, SEND_QUEUE_SIZE};
