//! Connection registry
//!
//! Tracks every live connection by id. Entries are created when the
//! transport reports a new client and removed when it reports the client
//! gone; nothing else adds or removes them.

use std::collections::HashMap;

use crate::connection::{Connection, ConnectionId, ConnectionState};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh Idle connection. Returns false if the id is taken.
    pub fn insert(&mut self, id: ConnectionId) -> bool {
        if self.connections.contains_key(&id) {
            return false;
        }
        self.connections.insert(id, Connection::new(id));
        true
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Registered and not yet closed
    pub fn is_live(&self, id: &ConnectionId) -> bool {
        self.connections
            .get(id)
            .is_some_and(|c| c.connected && c.state != ConnectionState::Closed)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Number of connections currently in the given state
    pub fn count_in(&self, state: ConnectionState) -> usize {
        self.connections
            .values()
            .filter(|c| c.state == state)
            .count()
    }
}
