//! Error types for the pairing engine and message relay.

use crate::connection::ConnectionId;

/// Maximum text message length (Unicode scalar values) unless configured otherwise.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 1000;

/// Validation failures reported back to the sender as an `error` notification.
///
/// The `Display` strings are what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid message format")]
    InvalidFormat,

    #[error("Message too long. Maximum {max} characters.")]
    MessageTooLong { max: usize },

    #[error("No partner connected")]
    NoPartner,

    #[error("Partner disconnected")]
    PartnerDisconnected,
}

impl RelayError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidFormat => "invalid_format",
            Self::MessageTooLong { .. } => "message_too_long",
            Self::NoPartner => "no_partner",
            Self::PartnerDisconnected => "partner_disconnected",
        }
    }
}

/// Failures talking to the engine actor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("pairing engine is gone")]
    EngineGone,

    #[error("pairing engine didn't respond")]
    NoResponse,

    #[error("connection already registered: {0}")]
    DuplicateConnection(ConnectionId),
}
