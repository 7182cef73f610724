//! WebSocket Protocol Types
//!
//! JSON text frames tagged by `type`. Inbound frames that do not match one
//! of the [`ClientMessage`] schemas are answered with an `error` frame.

use pair_engine::{ConnectionId, Notification, SignalKind};
use serde::{Deserialize, Serialize};

/// Messages sent FROM the client TO the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Enter matchmaking
    Join,
    /// Leave the current partner and look for another
    Skip,
    Message {
        text: String,
    },
    Typing,
    StopTyping,

    // === WebRTC signaling, relayed verbatim ===
    Offer {
        #[serde(default)]
        payload: serde_json::Value,
    },
    Answer {
        #[serde(default)]
        payload: serde_json::Value,
    },
    IceCandidate {
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl ClientMessage {
    /// Protocol name of this frame, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Skip => "skip",
            Self::Message { .. } => "message",
            Self::Typing => "typing",
            Self::StopTyping => "stop-typing",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
        }
    }
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Waiting,
    Paired {
        #[serde(rename = "partnerId")]
        partner_id: ConnectionId,
    },
    PartnerDisconnected,
    PartnerSkipped,
    ClearChat,
    Message {
        text: String,
    },
    PartnerTyping,
    PartnerStopTyping,
    Error {
        message: String,
    },
    Offer {
        payload: serde_json::Value,
    },
    Answer {
        payload: serde_json::Value,
    },
    IceCandidate {
        payload: serde_json::Value,
    },
}

impl From<Notification> for ServerMessage {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::Waiting => Self::Waiting,
            Notification::Paired { partner_id } => Self::Paired { partner_id },
            Notification::PartnerDisconnected => Self::PartnerDisconnected,
            Notification::PartnerSkipped => Self::PartnerSkipped,
            Notification::ClearChat => Self::ClearChat,
            Notification::Message { text } => Self::Message { text },
            Notification::PartnerTyping => Self::PartnerTyping,
            Notification::PartnerStopTyping => Self::PartnerStopTyping,
            Notification::Error { message } => Self::Error { message },
            Notification::Signal { kind, payload } => match kind {
                SignalKind::Offer => Self::Offer { payload },
                SignalKind::Answer => Self::Answer { payload },
                SignalKind::IceCandidate => Self::IceCandidate { payload },
            },
        }
    }
}
