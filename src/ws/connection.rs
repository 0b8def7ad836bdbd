//! Per-socket read/write loop.
//!
//! Each accepted socket gets a fresh [`ConnectionId`] and a bounded outbound
//! queue registered with the [`crate::domain::RoomRegistry`]. The loop
//! dispatches inbound frames one at a time, in arrival order, and drains the
//! outbound queue onto the socket.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::domain::{CLOSE_REPLACED, ConnectionId, ServerEvent};
use crate::service::{RelayOutcome, RelayService};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads event frames from the client and hands them to the relay.
/// - Writes events queued for this connection back to the client.
///
/// Returns when the client goes away or the registry evicts the connection,
/// in which case the socket is closed with [`CLOSE_REPLACED`]. The
/// connection leaves every room on exit.
pub async fn run_connection(socket: WebSocket, relay: Arc<RelayService>, queue_capacity: usize) {
    let connection_id = ConnectionId::new();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(queue_capacity.max(1));
    if let Err(e) = relay.registry().register(connection_id, out_tx).await {
        tracing::error!(%connection_id, error = %e, "failed to register connection");
        return;
    }
    tracing::info!(%connection_id, "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming frame from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text_message(&relay, connection_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(%connection_id, "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%connection_id, error = %e, "socket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            // Event routed to this connection
            event = out_rx.recv() => {
                let Some(event) = event else {
                    // Only eviction drops the registry's sender while we run.
                    tracing::info!(%connection_id, "connection replaced, closing");
                    let frame = CloseFrame {
                        code: CLOSE_REPLACED,
                        reason: Utf8Bytes::from_static("replaced by a newer connection"),
                    };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    break;
                };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%connection_id, event = event.name(), error = %e, "failed to encode event");
                    }
                }
            }
        }
    }

    if let Some(info) = relay.registry().remove(connection_id).await {
        tracing::info!(%connection_id, rooms = info.rooms.len(), "client disconnected");
    }
}

/// Dispatches one text frame. Failures are logged and never answered: the
/// sender gets no error frame.
async fn handle_text_message(relay: &RelayService, connection_id: ConnectionId, text: &str) {
    match relay.handle_frame(connection_id, text).await {
        Ok(RelayOutcome::Relayed { deliveries }) => {
            tracing::trace!(%connection_id, deliveries, "frame relayed");
        }
        Ok(RelayOutcome::Bound { .. }) => {}
        Err(e) => {
            tracing::warn!(%connection_id, error = %e, "dropping frame");
        }
    }
}
