//! WebSocket handler
//!
//! Authenticates the upgrade, then runs the connection's two pumps: a
//! reader that enforces the frame size and read deadline and hands frames
//! to the dispatcher, and a writer that drains the send queue and emits
//! keepalive pings.

use crate::connection::{Conn, SEND_QUEUE_SIZE};
use crate::server::GatewayState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use ripple_common::Claims;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

/// Maximum inbound frame size
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Upgrade endpoint: token on the query string or Authorization header
pub async fn ws_handler(
    State(state): State<GatewayState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = query.token.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_start_matches("Bearer ").to_string())
    });

    let Some(token) = token else {
        return (StatusCode::UNAUTHORIZED, "token required").into_response();
    };

    let claims = match state.jwt().validate_token(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "rejected upgrade");
            return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
        }
    };

    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(state, socket, claims))
}

/// Drive one connection until either pump exits
async fn handle_socket(state: GatewayState, socket: WebSocket, claims: Claims) {
    let conn_id = format!("{}-{}", claims.uid, Uuid::new_v4());
    let (tx, rx) = mpsc::channel::<Vec<u8>>(SEND_QUEUE_SIZE);
    let conn = Conn::new(
        conn_id,
        claims.uid,
        claims.device_id,
        claims.platform,
        tx,
    );

    state.hub().register(conn.clone()).await;

    let (sink, stream) = socket.split();

    let gateway = &state.config().gateway;
    let write_timeout = Duration::from_secs(gateway.write_timeout);
    let ping_interval = Duration::from_secs(gateway.heartbeat_timeout.max(2) / 2);
    let read_timeout = Duration::from_secs(gateway.read_timeout);

    let writer = tokio::spawn(write_pump(
        sink,
        rx,
        conn.clone(),
        write_timeout,
        ping_interval,
    ));

    read_pump(&state, stream, &conn, read_timeout).await;

    // Teardown: single-shot, whichever side initiated.
    conn.close();
    state.hub().unregister(conn.clone()).await;
    let _ = writer.await;
    conn.mark_closed();

    tracing::info!(conn_id = %conn.id(), uid = %conn.uid(), "connection closed");
}

/// Pull frames off the transport and hand them to the dispatcher
async fn read_pump(
    state: &GatewayState,
    mut stream: SplitStream<WebSocket>,
    conn: &Arc<Conn>,
    read_timeout: Duration,
) {
    loop {
        let message = tokio::select! {
            () = conn.closed() => break,
            next = timeout(read_timeout, stream.next()) => match next {
                Err(_) => {
                    tracing::info!(conn_id = %conn.id(), "read deadline expired");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "transport error");
                    break;
                }
                Ok(Some(Ok(message))) => message,
            },
        };

        match message {
            Message::Binary(data) => {
                state.dispatcher().handle_frame(conn, &data).await;
            }
            Message::Text(_) => {
                tracing::debug!(conn_id = %conn.id(), "text frame on a binary channel");
                let err = ripple_common::AppError::invalid_param("binary frames only");
                state.dispatcher().send_error(conn, 0, &err);
            }
            // Deadline is re-armed per frame, so keepalives reset it too.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                tracing::debug!(conn_id = %conn.id(), "client closed");
                break;
            }
        }
    }
}

/// Drain the send queue; emit keepalive pings at half the heartbeat timeout
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Vec<u8>>,
    conn: Arc<Conn>,
    write_timeout: Duration,
    ping_interval: Duration,
) {
    let mut ticker = tokio::time::interval(ping_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick is immediate; skip it so pings start one period in.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = conn.closed() => break,
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                match timeout(write_timeout, sink.send(Message::Binary(frame.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(conn_id = %conn.id(), error = %e, "write failed");
                        conn.close();
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(conn_id = %conn.id(), "write deadline expired");
                        conn.close();
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                let ping = Message::Ping(Vec::new().into());
                if timeout(write_timeout, sink.send(ping)).await.map_or(true, |r| r.is_err()) {
                    tracing::debug!(conn_id = %conn.id(), "keepalive failed");
                    conn.close();
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}
