//! Event pipeline
//!
//! authorize → validate (revoke/edit) → persist (if the kind requires it)
//! → fan out → acknowledge. The sender field is always overwritten with the
//! connection's authenticated uid; the hub never sees an unpersisted event
//! of a persistent kind.

use super::{with_deadline, Dispatcher};
use crate::connection::Conn;
use ripple_common::{AppError, AppResult};
use ripple_proto::{Envelope, Event, EventBody, EventKind};
use std::sync::Arc;

/// How an inbound event routes through the pipeline
enum Route {
    /// Broadcast only, never persisted
    Typing,
    /// Validate against the target, then persist
    Revoke(i64),
    /// Validate against the target, then persist
    Edit(i64),
    /// Update the receipt store, then broadcast
    ReadReceipt(i64),
    /// Straight to the persist path
    Persist,
}

impl Dispatcher {
    pub(super) async fn handle_event(&self, conn: &Arc<Conn>, envelope: &Envelope) -> AppResult<()> {
        let mut event = Event::from_value(&envelope.body)?;

        // Never trust a client-supplied sender.
        event.sender = conn.uid().to_string();

        let access = self.check_access(conn.uid(), event.cid.as_str()).await?;
        if !access.has_access {
            return Err(AppError::NotInConversation);
        }
        if access.muted && event.kind() != Some(EventKind::ReadReceipt) {
            return Err(AppError::Forbidden("you are muted".to_string()));
        }

        let route = match &event.body {
            EventBody::Typing { .. } => Route::Typing,
            EventBody::Revoke { .. } => Route::Revoke(require_target(&event)?),
            EventBody::Edit { .. } => Route::Edit(require_target(&event)?),
            EventBody::ReadReceipt { last_read_mid } => Route::ReadReceipt(*last_read_mid),
            _ => Route::Persist,
        };

        match route {
            Route::Typing => {
                self.broadcast_event(&event).await?;
                self.send(conn, &Envelope::ack(envelope.seq, 0));
            }
            Route::Revoke(target_mid) => {
                let outcome = with_deadline(self.relay().validate_revoke(
                    event.cid.as_str(),
                    conn.uid(),
                    target_mid,
                    access.role.is_admin(),
                ))
                .await?;

                if !outcome.valid {
                    return Err(AppError::CannotRevoke(reason(outcome.reason)));
                }
                self.persist_and_broadcast(conn, envelope.seq, &mut event).await?;
            }
            Route::Edit(target_mid) => {
                let outcome = with_deadline(self.relay().validate_edit(
                    event.cid.as_str(),
                    conn.uid(),
                    target_mid,
                ))
                .await?;

                if !outcome.valid {
                    return Err(AppError::CannotEdit(reason(outcome.reason)));
                }
                self.persist_and_broadcast(conn, envelope.seq, &mut event).await?;
            }
            Route::ReadReceipt(last_read_mid) => {
                with_deadline(self.relay().update_read_receipt(
                    event.cid.as_str(),
                    conn.uid(),
                    last_read_mid,
                ))
                .await?;

                // Other members see the read progress as an event push.
                self.broadcast_event(&event).await?;
                self.send(conn, &Envelope::ack(envelope.seq, 0));
            }
            Route::Persist => {
                self.persist_and_broadcast(conn, envelope.seq, &mut event).await?;
            }
        }

        tracing::debug!(
            conn_id = %conn.id(),
            uid = %conn.uid(),
            cid = %event.cid,
            kind = event.kind_code(),
            "event processed"
        );
        Ok(())
    }

    /// Persist through the relay, then fan out, then acknowledge
    ///
    /// A persistence failure stops the pipeline before broadcast: clients
    /// retry on internal errors, subscribers never see an unstored event.
    async fn persist_and_broadcast(
        &self,
        conn: &Conn,
        seq: i64,
        event: &mut Event,
    ) -> AppResult<()> {
        let stored = with_deadline(self.relay().store_event(event)).await?;

        event.mid = stored.mid;
        event.timestamp = stored.timestamp;

        self.broadcast_event(event).await?;
        self.send(conn, &Envelope::ack(seq, stored.mid));
        Ok(())
    }
}

fn require_target(event: &Event) -> AppResult<i64> {
    event
        .target_mid()
        .ok_or_else(|| AppError::invalid_param("missing target tag"))
}

fn reason(reason: Option<String>) -> String {
    reason.unwrap_or_else(|| "rejected".to_string())
}
