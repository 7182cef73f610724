use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a live connection
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Matchmaking state of a single connection.
///
/// ```text
/// Idle ──join──► Waiting ──matched──► Paired
///   ▲                                   │
///   └──────────── skip / partner gone ──┘
/// any ──disconnect──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Waiting,
    Paired,
    Closed,
}

/// A client's session as seen by the engine
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub partner: Option<ConnectionId>,
    pub state: ConnectionState,
    /// Cleared when the transport reports the client gone
    pub connected: bool,
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            partner: None,
            state: ConnectionState::Idle,
            connected: true,
            connected_at: Utc::now(),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.state == ConnectionState::Paired
    }

    /// True if this connection may sit in the waiting slot
    pub fn can_wait(&self) -> bool {
        self.connected && self.state == ConnectionState::Waiting && self.partner.is_none()
    }

    /// Drop the partner link and fall back to Idle
    pub(crate) fn unlink(&mut self) {
        self.partner = None;
        if self.state == ConnectionState::Paired {
            self.state = ConnectionState::Idle;
        }
    }
}
