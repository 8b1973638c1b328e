/**
 * WebSocket Gateway
 *
 * Transport wiring between client connections and the synchronization
 * engine. The gateway accepts the upgrade, assigns a connection
 * identifier, and runs two halves:
 *
 * - a writer task draining the connection's event channel into the socket
 * - a read loop parsing inbound JSON into `ClientMessage` and dispatching
 *   it to the engine
 *
 * The gateway interprets nothing: unknown message types reach the engine
 * as `ClientMessage::Unknown` and come back as protocol error events, and
 * malformed JSON is answered with an error event without dropping the
 * connection. Disconnect (client close, socket error, or end of stream)
 * triggers the engine's cleanup exactly once.
 */

use crate::server::state::AppState;
use crate::sync::SyncEngine;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle `GET /ws`: upgrade and hand the socket to the connection loop
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.engine.clone()))
}

async fn handle_socket(socket: WebSocket, engine: Arc<SyncEngine>) {
    let connection_id = Uuid::new_v4();
    tracing::info!("[Gateway] Connection {connection_id} established");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.connect(connection_id, tx);

    // Writer half: serialize engine events onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!("[Gateway] Failed to serialize {}: {err}", event.kind());
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader half: one message handled fully before the next is read.
    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(client_message) => engine.dispatch(connection_id, client_message).await,
                Err(err) => {
                    tracing::debug!("[Gateway] Unparseable message from {connection_id}: {err}");
                    engine
                        .broadcaster()
                        .send_error(connection_id, format!("Malformed message: {err}"));
                }
            },
            Ok(Message::Binary(data)) => {
                tracing::debug!(
                    "[Gateway] Ignoring binary frame from {connection_id} ({} bytes)",
                    data.len()
                );
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Axum answers pings itself; nothing to do.
            }
            Ok(Message::Close(_)) => {
                tracing::info!("[Gateway] Connection {connection_id} closed by client");
                break;
            }
            Err(err) => {
                tracing::warn!("[Gateway] Connection {connection_id} errored: {err}");
                break;
            }
        }
    }

    engine.disconnect(connection_id);
    writer.abort();
    tracing::info!("[Gateway] Connection {connection_id} finished");
}
