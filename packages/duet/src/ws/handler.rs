//! Per-connection WebSocket loop.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use pair_engine::{ConnectionId, EngineHandle, Notification};

use super::dispatch::{ConnectionContext, handle_text_frame};
use super::protocol::ServerMessage;
use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;

/// Serve one chat client until its socket closes.
///
/// The connection is registered with the engine together with a bounded
/// mailbox. One task drains the mailbox into the socket, the other reads
/// frames and dispatches them. When either side ends the engine is told the
/// client is gone.
pub async fn handle_chat_ws(
    socket: WebSocket,
    engine: EngineHandle,
    server_config: Arc<ServerConfig>,
    metrics: Arc<ServerMetrics>,
) {
    let connection_id = ConnectionId::new();
    info!(conn_id = %connection_id, "New chat connection");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Notification>(server_config.chat.mailbox_capacity);

    if let Err(e) = engine.connect(connection_id, tx.clone()).await {
        error!(conn_id = %connection_id, "Failed to register connection: {}", e);
        metrics.engine_error();
        metrics.connection_closed();
        return;
    }

    // Task to send notifications to the WebSocket
    let sender_metrics = metrics.clone();
    let sender_task = async move {
        while let Some(notification) = rx.recv().await {
            let json = match serde_json::to_string(&ServerMessage::from(notification)) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            sender_metrics.frame_sent();
        }
    };

    // Task to handle incoming frames
    let ctx = ConnectionContext {
        connection_id,
        engine: engine.clone(),
        tx,
        metrics: metrics.clone(),
    };
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Err(e) = handle_text_frame(&ctx, text.as_str()).await {
                        error!(conn_id = %ctx.connection_id, "Engine request failed: {}", e);
                        ctx.metrics.engine_error();
                        break;
                    }
                }
                Ok(Message::Binary(_)) => {
                    ctx.metrics.invalid_frame();
                    debug!(conn_id = %ctx.connection_id, "Ignoring binary frame");
                }
                Ok(Message::Close(_)) => {
                    debug!("Client closed connection");
                    break;
                }
                Err(e) => {
                    warn!(conn_id = %ctx.connection_id, "WebSocket error: {}", e);
                    ctx.metrics.websocket_error();
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!("Sender task ended"),
        _ = input_task => debug!("Input task ended"),
    }

    if let Err(e) = engine.disconnect(connection_id).await {
        warn!(conn_id = %connection_id, "Failed to deregister connection: {}", e);
        metrics.engine_error();
    }
    metrics.connection_closed();
    info!(conn_id = %connection_id, "Chat connection closed");
}
