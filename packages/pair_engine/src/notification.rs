//! Outbound notifications produced by engine transactions.
//!
//! A transaction never talks to a socket. It appends `(recipient,
//! notification)` pairs to an [`Outbox`], and the engine actor delivers
//! them once the transaction has committed.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;

/// WebRTC negotiation payload kinds relayed between partners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Waiting,
    Paired { partner_id: ConnectionId },
    PartnerDisconnected,
    PartnerSkipped,
    ClearChat,
    Message { text: String },
    PartnerTyping,
    PartnerStopTyping,
    Error { message: String },
    Signal {
        kind: SignalKind,
        payload: serde_json::Value,
    },
}

impl Notification {
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

/// Notifications queued by one transaction, in emission order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outbox {
    entries: Vec<(ConnectionId, Notification)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, to: ConnectionId, notification: Notification) {
        self.entries.push((to, notification));
    }

    pub fn extend(&mut self, other: Outbox) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ConnectionId, Notification)> {
        self.entries.iter()
    }

    /// Notifications addressed to `id`, in order
    pub fn for_connection(&self, id: &ConnectionId) -> Vec<&Notification> {
        self.entries
            .iter()
            .filter(|(to, _)| to == id)
            .map(|(_, n)| n)
            .collect()
    }
}

impl IntoIterator for Outbox {
    type Item = (ConnectionId, Notification);
    type IntoIter = std::vec::IntoIter<(ConnectionId, Notification)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
