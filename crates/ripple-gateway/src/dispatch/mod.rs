//! Message dispatcher
//!
//! Routes each inbound envelope by command: authorize against the
//! directory, persist through the relay where the kind requires it, fan out
//! via the hub, and answer the originating connection. Every request gets
//! exactly one terminal frame: `ack`, `error`, or the sync data frame.

mod event;

use crate::connection::Conn;
use crate::hub::Hub;
use ripple_client::{DirectoryApi, RelayApi};
use ripple_common::{AppError, AppResult};
use ripple_proto::rpc::{AccessDecision, QueryEventsParams, StoredEventData};
use ripple_proto::{Command, Envelope, SyncBody};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Deadline applied to every outbound RPC
pub const RPC_DEADLINE: Duration = Duration::from_secs(5);

/// Scope an upstream call to the per-call deadline
///
/// Expiry surfaces as an internal error to the client; the upstream may
/// still complete in the background.
pub(crate) async fn with_deadline<T, F>(future: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(RPC_DEADLINE, future).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Rpc("upstream deadline exceeded".to_string())),
    }
}

/// Per-frame router
pub struct Dispatcher {
    hub: Arc<Hub>,
    relay: Arc<dyn RelayApi>,
    directory: Arc<dyn DirectoryApi>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(hub: Arc<Hub>, relay: Arc<dyn RelayApi>, directory: Arc<dyn DirectoryApi>) -> Self {
        Self {
            hub,
            relay,
            directory,
        }
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub(crate) fn relay(&self) -> &Arc<dyn RelayApi> {
        &self.relay
    }

    /// Handle one inbound frame from a connection
    pub async fn handle_frame(&self, conn: &Arc<Conn>, data: &[u8]) {
        let envelope = match ripple_proto::decode_envelope(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "undecodable frame");
                self.send_error(conn, 0, &AppError::from(e));
                return;
            }
        };

        let seq = envelope.seq;
        let result = match envelope.cmd {
            Command::Ping => self.handle_ping(conn, &envelope),
            Command::Subscribe => self.handle_subscribe(conn, &envelope).await,
            Command::Unsubscribe => self.handle_unsubscribe(conn, &envelope),
            Command::Sync => self.handle_sync(conn, &envelope).await,
            Command::Event => self.handle_event(conn, &envelope).await,
            _ => Err(AppError::invalid_param(format!(
                "unknown command: {}",
                envelope.cmd
            ))),
        };

        if let Err(err) = result {
            self.send_error(conn, seq, &err);
        }
    }

    fn handle_ping(&self, conn: &Conn, envelope: &Envelope) -> AppResult<()> {
        self.send(conn, &Envelope::pong(envelope.seq));
        Ok(())
    }

    async fn handle_subscribe(&self, conn: &Arc<Conn>, envelope: &Envelope) -> AppResult<()> {
        let cid = envelope
            .body_str()
            .ok_or_else(|| AppError::invalid_param("subscribe body must be a cid string"))?;

        let access = self.check_access(conn.uid(), cid).await?;
        if !access.has_access {
            return Err(AppError::NotInConversation);
        }

        self.hub.subscribe(conn, cid);
        self.send(conn, &Envelope::ack(envelope.seq, 0));
        Ok(())
    }

    fn handle_unsubscribe(&self, conn: &Conn, envelope: &Envelope) -> AppResult<()> {
        let cid = envelope
            .body_str()
            .ok_or_else(|| AppError::invalid_param("unsubscribe body must be a cid string"))?;

        // No authorization needed to stop receiving.
        self.hub.unsubscribe(conn, cid);
        self.send(conn, &Envelope::ack(envelope.seq, 0));
        Ok(())
    }

    async fn handle_sync(&self, conn: &Arc<Conn>, envelope: &Envelope) -> AppResult<()> {
        let sync = SyncBody::from_value(&envelope.body)?;

        let access = self.check_access(conn.uid(), &sync.cid).await?;
        if !access.has_access {
            return Err(AppError::NotInConversation);
        }

        let events = if sync.last_mid > 0 {
            // Incremental catch-up from the client's last seen mid.
            with_deadline(self.relay.query_events(&QueryEventsParams {
                cid: sync.cid.clone(),
                last_mid: sync.last_mid,
                before: sync.before,
                after: sync.after,
                kinds: Vec::new(),
                limit: sync.limit,
            }))
            .await?
            .events
        } else {
            with_deadline(self.relay.sync_events(&sync.cid, sync.limit))
                .await?
                .events
        };

        tracing::debug!(
            conn_id = %conn.id(),
            cid = %sync.cid,
            count = events.len(),
            "sync served"
        );

        self.send(
            conn,
            &Envelope::event_reply(envelope.seq, sync_result_body(&sync.cid, &events)?),
        );
        Ok(())
    }

    pub(crate) async fn check_access(&self, uid: &str, cid: &str) -> AppResult<AccessDecision> {
        with_deadline(self.directory.check_access(uid, cid)).await
    }

    pub(crate) fn send(&self, conn: &Conn, envelope: &Envelope) {
        if let Err(e) = conn.send_envelope(envelope) {
            tracing::warn!(conn_id = %conn.id(), error = %e, "failed to encode reply");
        }
    }

    pub(crate) fn send_error(&self, conn: &Conn, seq: i64, err: &AppError) {
        if err.is_client_error() {
            tracing::debug!(conn_id = %conn.id(), seq = seq, error = %err, "request rejected");
        } else {
            tracing::error!(conn_id = %conn.id(), seq = seq, error = %err, "request failed");
        }

        self.send(
            conn,
            &Envelope::new(Command::Error, seq, err.error_body(seq).to_value()),
        );
    }

    /// Encode the completed event and fan it out to the conversation
    pub(crate) async fn broadcast_event(&self, event: &ripple_proto::Event) -> AppResult<()> {
        let frame = ripple_proto::encode_envelope(&Envelope::event_push(event))?;
        self.hub.broadcast(event.cid.as_str(), frame).await;
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SyncResult<'a> {
    cid: &'a str,
    events: &'a [StoredEventData],
}

fn sync_result_body(cid: &str, events: &[StoredEventData]) -> AppResult<rmpv::Value> {
    rmpv_body(&SyncResult { cid, events })
}

fn rmpv_body<T: Serialize>(value: &T) -> AppResult<rmpv::Value> {
    rmpv::ext::to_value(value)
        .map_err(|e| AppError::internal(anyhow::anyhow!("encode body: {e}")))
}
