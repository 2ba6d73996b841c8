//! Test fixtures
//!
//! A [`TestBed`] wires a real hub and dispatcher to the in-memory fakes.
//! Connections are driven by injecting frames straight into the dispatcher
//! and reading replies off each connection's queue, the same seams the
//! WebSocket pumps use in production.

use crate::fakes::{InMemoryDirectory, InMemoryRelay};
use ripple_gateway::{Conn, Dispatcher, Hub, SEND_QUEUE_SIZE};
use ripple_proto::{
    decode_envelope, encode_envelope, AckBody, Command, Envelope, ErrorBody, Event,
};
use rmpv::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A gateway core wired to in-memory collaborators
pub struct TestBed {
    pub hub: Arc<Hub>,
    pub dispatcher: Dispatcher,
    pub relay: Arc<InMemoryRelay>,
    pub directory: Arc<InMemoryDirectory>,
}

impl TestBed {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_conns(0)
    }

    #[must_use]
    pub fn with_max_conns(max_conn_per_user: usize) -> Self {
        let hub = Hub::spawn(max_conn_per_user);
        let relay = Arc::new(InMemoryRelay::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let dispatcher = Dispatcher::new(hub.clone(), relay.clone(), directory.clone());

        Self {
            hub,
            dispatcher,
            relay,
            directory,
        }
    }

    /// Register an authenticated connection and wait for the hub to apply it
    pub async fn connect(&self, uid: &str) -> (Arc<Conn>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_SIZE);
        let conn = Conn::new(format!("{uid}-conn"), uid, "dev-1", "test", tx);

        self.hub.register(conn.clone()).await;
        for _ in 0..200 {
            if self.hub.get_conn(conn.id()).is_some() {
                return (conn, rx);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("hub never registered {uid}");
    }

    /// Feed a raw frame through the dispatcher as if the reader produced it
    pub async fn dispatch(&self, conn: &Arc<Conn>, envelope: &Envelope) {
        let frame = encode_envelope(envelope).expect("encode test frame");
        self.dispatcher.handle_frame(conn, &frame).await;
    }
}

impl Default for TestBed {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `subscribe` request
#[must_use]
pub fn subscribe(seq: i64, cid: &str) -> Envelope {
    Envelope::new(Command::Subscribe, seq, Value::from(cid))
}

/// Build an `unsubscribe` request
#[must_use]
pub fn unsubscribe(seq: i64, cid: &str) -> Envelope {
    Envelope::new(Command::Unsubscribe, seq, Value::from(cid))
}

/// Build an `event` request
#[must_use]
pub fn event_request(seq: i64, event: &Event) -> Envelope {
    Envelope::new(Command::Event, seq, event.to_value())
}

/// Receive and decode the next frame from a connection's queue
pub async fn recv_envelope(rx: &mut mpsc::Receiver<Vec<u8>>) -> Envelope {
    let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("connection queue closed");
    decode_envelope(&frame).expect("undecodable frame from gateway")
}

/// Expect an `ack` and return its body
pub async fn expect_ack(rx: &mut mpsc::Receiver<Vec<u8>>) -> AckBody {
    let envelope = recv_envelope(rx).await;
    assert_eq!(envelope.cmd, Command::Ack, "expected ack, got {envelope:?}");
    AckBody::from_value(&envelope.body).expect("malformed ack body")
}

/// Expect an `error` and return its body
pub async fn expect_error(rx: &mut mpsc::Receiver<Vec<u8>>) -> ErrorBody {
    let envelope = recv_envelope(rx).await;
    assert_eq!(
        envelope.cmd,
        Command::Error,
        "expected error, got {envelope:?}"
    );
    ErrorBody::from_value(&envelope.body).expect("malformed error body")
}

/// Expect an `event` push (seq 0) and decode its event
pub async fn expect_event_push(rx: &mut mpsc::Receiver<Vec<u8>>) -> Event {
    let envelope = recv_envelope(rx).await;
    assert_eq!(
        envelope.cmd,
        Command::Event,
        "expected event push, got {envelope:?}"
    );
    assert_eq!(envelope.seq, 0, "pushes carry seq 0");
    Event::from_value(&envelope.body).expect("malformed event body")
}

/// Assert that nothing arrives on the queue within a grace period
pub async fn expect_silence(rx: &mut mpsc::Receiver<Vec<u8>>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        rx.try_recv().is_err(),
        "expected no frame, but one was delivered"
    );
}
