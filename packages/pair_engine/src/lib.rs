//! Pair Engine - matchmaking core for anonymous one-on-one chat
//!
//! This crate pairs connections through a single waiting slot and relays
//! chat, typing and WebRTC signaling traffic between partners. It has no
//! HTTP or socket dependencies; the transport registers each connection
//! with a mailbox and feeds client events into an [`EngineHandle`].
//!
//! All state lives in one actor ([`PairingEngine`]) so `join`, `skip` and
//! `disconnect` never interleave.
//!
//! # Example
//!
//! ```no_run
//! use pair_engine::{ConnectionId, EngineConfig, Notification, PairingEngine};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = PairingEngine::spawn(EngineConfig::default());
//!
//!     let alice = ConnectionId::new();
//!     let (tx, mut rx) = mpsc::channel(100);
//!     engine.connect(alice, tx).await.unwrap();
//!
//!     engine.join(alice).await.unwrap();
//!     while let Some(notification) = rx.recv().await {
//!         if let Notification::Paired { partner_id } = notification {
//!             println!("paired with {}", partner_id);
//!             break;
//!         }
//!     }
//! }
//! ```

mod connection;
mod engine;
mod error;
mod notification;
mod registry;
mod relay;
mod signaling;
mod slot;
mod state;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use engine::{EngineCommand, EngineConfig, EngineHandle, Mailbox, PairingEngine};
pub use error::{DEFAULT_MAX_MESSAGE_CHARS, EngineError, RelayError};
pub use notification::{Notification, Outbox, SignalKind};
pub use registry::ConnectionRegistry;
pub use relay::validate_message;
pub use slot::WaitingSlot;
pub use state::{EngineStats, MatchState};
