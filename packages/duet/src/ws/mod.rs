//! Chat WebSocket transport
//!
//! One socket per client. Frames are decoded into [`ClientMessage`]s and
//! handed to the pairing engine; engine notifications come back through the
//! connection's mailbox as [`ServerMessage`]s.

mod dispatch;
mod handler;
mod protocol;

pub use handler::handle_chat_ws;
pub use protocol::{ClientMessage, ServerMessage};
