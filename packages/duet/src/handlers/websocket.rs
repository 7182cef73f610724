use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Chat WebSocket endpoint - one anonymous client per connection
pub async fn chat_websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let engine = state.engine.clone();
    let server_config = state.server_config.clone();
    let metrics = state.metrics.clone();

    ws.on_upgrade(move |socket| ws::handle_chat_ws(socket, engine, server_config, metrics))
}
