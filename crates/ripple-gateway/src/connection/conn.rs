//! Individual client connection
//!
//! A connection is bound to an authenticated user at upgrade time and owns a
//! bounded outgoing frame queue. If the queue fills, the connection is
//! closed rather than dropping individual frames, which preserves the
//! per-connection ordering guarantee.

use ripple_proto::{encode_envelope, CodecError, Envelope};
use std::pin::pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

/// Outgoing queue capacity, in frames
pub const SEND_QUEUE_SIZE: usize = 256;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnState {
    /// Serving traffic
    Open = 0,
    /// Close requested; pumps exit on their next iteration
    Closing = 1,
    /// Torn down; terminal
    Closed = 2,
}

/// A live client connection
pub struct Conn {
    id: String,
    uid: String,
    device_id: String,
    platform: String,
    sender: mpsc::Sender<Vec<u8>>,
    state: AtomicU8,
    close_notify: Notify,
    created_at: Instant,
}

impl Conn {
    /// Create a connection bound to an authenticated user
    pub fn new(
        id: impl Into<String>,
        uid: impl Into<String>,
        device_id: impl Into<String>,
        platform: impl Into<String>,
        sender: mpsc::Sender<Vec<u8>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            uid: uid.into(),
            device_id: device_id.into(),
            platform: platform.into(),
            sender,
            state: AtomicU8::new(ConnState::Open as u8),
            close_notify: Notify::new(),
            created_at: Instant::now(),
        })
    }

    /// Unique connection id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Authenticated user id
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Device presenting the session token
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Client platform
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// When the connection was registered
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ConnState {
        match self.state.load(Ordering::SeqCst) {
            0 => ConnState::Open,
            1 => ConnState::Closing,
            _ => ConnState::Closed,
        }
    }

    /// Enqueue a frame without blocking
    ///
    /// A full queue closes the connection: we drop the connection, not
    /// frames. Returns whether the frame was enqueued.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        if self.state() != ConnState::Open {
            return false;
        }

        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    conn_id = %self.id,
                    uid = %self.uid,
                    "send queue full, closing connection"
                );
                self.close();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.close();
                false
            }
        }
    }

    /// Encode and enqueue an envelope
    ///
    /// # Errors
    /// Returns an error only if encoding fails; queue overflow closes the
    /// connection instead.
    pub fn send_envelope(&self, envelope: &Envelope) -> Result<(), CodecError> {
        let frame = encode_envelope(envelope)?;
        self.send(frame);
        Ok(())
    }

    /// Request close; idempotent
    ///
    /// Moves `Open → Closing` exactly once and wakes both pumps.
    pub fn close(&self) {
        if self
            .state
            .compare_exchange(
                ConnState::Open as u8,
                ConnState::Closing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            self.close_notify.notify_waiters();
        }
    }

    /// Mark teardown complete (`Closing → Closed`)
    pub fn mark_closed(&self) {
        self.close();
        self.state.store(ConnState::Closed as u8, Ordering::SeqCst);
    }

    /// Whether close has been requested
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() != ConnState::Open
    }

    /// Resolve once close is requested
    pub async fn closed(&self) {
        let mut notified = pin!(self.close_notify.notified());
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("id", &self.id)
            .field("uid", &self.uid)
            .field("state", &self.state())
            .finish()
    }
}
