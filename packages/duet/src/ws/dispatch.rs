//! Maps decoded client frames onto pairing engine requests.

use std::sync::Arc;
use tracing::{debug, warn};

use pair_engine::{ConnectionId, EngineError, EngineHandle, Mailbox, Notification, RelayError, SignalKind};

use super::protocol::ClientMessage;
use crate::metrics::ServerMetrics;

/// Everything a connection needs to act on its inbound frames.
pub(crate) struct ConnectionContext {
    pub connection_id: ConnectionId,
    pub engine: EngineHandle,
    /// The connection's own mailbox, for replies produced outside the engine
    pub tx: Mailbox,
    pub metrics: Arc<ServerMetrics>,
}

/// Decode one text frame and act on it.
///
/// Malformed frames are answered with an `error` frame and otherwise
/// ignored. An `Err` means the engine is unusable and the connection
/// should close.
pub(crate) async fn handle_text_frame(
    ctx: &ConnectionContext,
    text: &str,
) -> Result<(), EngineError> {
    ctx.metrics.frame_received();
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => dispatch_client_message(ctx, msg).await,
        Err(e) => {
            ctx.metrics.invalid_frame();
            warn!(conn_id = %ctx.connection_id, "Invalid client frame: {}", e);
            if ctx
                .tx
                .send(Notification::error(RelayError::InvalidFormat))
                .await
                .is_err()
            {
                debug!(conn_id = %ctx.connection_id, "Mailbox closed before error reply");
            }
            Ok(())
        }
    }
}

pub(crate) async fn dispatch_client_message(
    ctx: &ConnectionContext,
    msg: ClientMessage,
) -> Result<(), EngineError> {
    let id = ctx.connection_id;
    debug!(conn_id = %id, kind = msg.kind(), "Client frame");
    match msg {
        ClientMessage::Join => {
            ctx.engine.join(id).await?;
        }
        ClientMessage::Skip => ctx.engine.skip(id).await?,
        ClientMessage::Message { text } => ctx.engine.send_message(id, text).await?,
        ClientMessage::Typing => ctx.engine.typing(id, true).await?,
        ClientMessage::StopTyping => ctx.engine.typing(id, false).await?,
        ClientMessage::Offer { payload } => {
            ctx.engine.signal(id, SignalKind::Offer, payload).await?
        }
        ClientMessage::Answer { payload } => {
            ctx.engine.signal(id, SignalKind::Answer, payload).await?
        }
        ClientMessage::IceCandidate { payload } => {
            ctx.engine
                .signal(id, SignalKind::IceCandidate, payload)
                .await?
        }
    }
    Ok(())
}
