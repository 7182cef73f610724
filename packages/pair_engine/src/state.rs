//! Matchmaking state and its transactions
//!
//! `MatchState` owns the registry, the waiting slot and every partner link.
//! Each public method is one transaction: it runs to completion without
//! awaiting, mutates state, and returns the notifications it produced.
//! The engine actor is the only caller in production, which is what makes
//! the transactions serial.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionId, ConnectionState};
use crate::error::DEFAULT_MAX_MESSAGE_CHARS;
use crate::notification::{Notification, Outbox};
use crate::registry::ConnectionRegistry;
use crate::slot::WaitingSlot;

/// Point-in-time view of the engine, for health and metrics endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub connections: u64,
    pub waiting: u64,
    pub active_pairs: u64,
    pub total_pairings: u64,
    pub total_skips: u64,
    pub total_disconnects: u64,
    pub notifications_dropped: u64,
}

#[derive(Debug)]
pub struct MatchState {
    pub(crate) registry: ConnectionRegistry,
    pub(crate) slot: WaitingSlot,
    pub(crate) max_message_chars: usize,
    total_pairings: u64,
    total_skips: u64,
    total_disconnects: u64,
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_CHARS)
    }
}

impl MatchState {
    pub fn new(max_message_chars: usize) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            slot: WaitingSlot::new(),
            max_message_chars,
            total_pairings: 0,
            total_skips: 0,
            total_disconnects: 0,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.registry.get(id)
    }

    pub fn partner_of(&self, id: &ConnectionId) -> Option<ConnectionId> {
        self.registry.get(id).and_then(|c| c.partner)
    }

    /// Current waiting slot occupant
    pub fn waiting(&self) -> Option<ConnectionId> {
        self.slot.peek()
    }

    pub fn max_message_chars(&self) -> usize {
        self.max_message_chars
    }

    /// Register a new Idle connection. Returns false if the id is already known.
    pub fn connect(&mut self, id: ConnectionId) -> bool {
        let inserted = self.registry.insert(id);
        if inserted {
            info!(conn_id = %id, total = self.registry.len(), "Connection registered");
        }
        inserted
    }

    /// Try to pair `id` with the waiting connection, or make it wait.
    ///
    /// Returns whether a pairing occurred.
    pub fn request_pair(&mut self, id: ConnectionId) -> (bool, Outbox) {
        let mut outbox = Outbox::new();
        let paired = self.request_pair_into(id, &mut outbox);
        (paired, outbox)
    }

    pub(crate) fn request_pair_into(&mut self, id: ConnectionId, outbox: &mut Outbox) -> bool {
        let Some(conn) = self.registry.get(&id) else {
            debug!(conn_id = %id, "Join from unknown connection ignored");
            return false;
        };
        match conn.state {
            ConnectionState::Paired => {
                debug!(conn_id = %id, partner = ?conn.partner, "Join while paired ignored");
                return false;
            }
            ConnectionState::Closed => return false,
            ConnectionState::Idle | ConnectionState::Waiting => {}
        }
        if !conn.connected {
            return false;
        }

        loop {
            let Some(candidate) = self.slot.peek() else {
                self.slot.occupy(id);
                if let Some(conn) = self.registry.get_mut(&id) {
                    conn.state = ConnectionState::Waiting;
                }
                debug!(conn_id = %id, "Connection waiting");
                outbox.push(id, Notification::Waiting);
                return false;
            };

            if candidate == id {
                outbox.push(id, Notification::Waiting);
                return false;
            }

            let fresh = self.registry.get(&candidate).is_some_and(|c| c.can_wait());
            self.slot.take();
            if !fresh {
                debug!(conn_id = %candidate, "Evicting stale waiting connection");
                if let Some(stale) = self.registry.get_mut(&candidate) {
                    if stale.state == ConnectionState::Waiting {
                        stale.state = ConnectionState::Idle;
                    }
                }
                continue;
            }

            self.link(id, candidate);
            self.total_pairings += 1;
            info!(a = %id, b = %candidate, "Paired");
            outbox.push(id, Notification::Paired {
                partner_id: candidate,
            });
            outbox.push(candidate, Notification::Paired { partner_id: id });
            return true;
        }
    }

    /// Leave the current partner and immediately re-enter matchmaking.
    ///
    /// The skipped partner is re-queued first, then the skipper. When the
    /// slot was empty this lets the skipper land back on the same partner.
    pub fn skip(&mut self, id: ConnectionId) -> Outbox {
        let mut outbox = Outbox::new();
        let Some(conn) = self.registry.get_mut(&id) else {
            return outbox;
        };
        if conn.state != ConnectionState::Paired {
            debug!(conn_id = %id, state = ?conn.state, "Skip while not paired ignored");
            return outbox;
        }

        let partner_id = conn.partner;
        conn.unlink();
        self.total_skips += 1;
        outbox.push(id, Notification::ClearChat);

        let partner_id = partner_id.filter(|p| self.sever_from(p, &id));
        match partner_id {
            Some(partner_id) => {
                info!(conn_id = %id, partner = %partner_id, "Skipped partner");
                outbox.push(partner_id, Notification::PartnerSkipped);
                outbox.push(partner_id, Notification::ClearChat);
                self.request_pair_into(partner_id, &mut outbox);
            }
            None => debug!(conn_id = %id, "Skipped partner was already gone"),
        }

        self.request_pair_into(id, &mut outbox);
        outbox
    }

    /// Remove `id` for good. Safe to call more than once.
    ///
    /// The former partner is told and left Idle; it must join again itself.
    pub fn disconnect(&mut self, id: ConnectionId) -> Outbox {
        let mut outbox = Outbox::new();
        let Some(conn) = self.registry.get_mut(&id) else {
            return outbox;
        };
        conn.connected = false;
        let partner_id = conn.partner.take();
        conn.state = ConnectionState::Closed;

        if self.slot.release(&id) {
            debug!(conn_id = %id, "Removed from waiting slot");
        }

        if let Some(partner_id) = partner_id {
            if self.sever_from(&partner_id, &id) {
                info!(conn_id = %id, partner = %partner_id, "Notifying partner of disconnect");
                outbox.push(partner_id, Notification::ClearChat);
                outbox.push(partner_id, Notification::PartnerDisconnected);
            }
        }

        self.registry.remove(&id);
        self.total_disconnects += 1;
        info!(conn_id = %id, remaining = self.registry.len(), "Connection closed");
        outbox
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            connections: self.registry.len() as u64,
            waiting: u64::from(!self.slot.is_empty()),
            active_pairs: (self.registry.count_in(ConnectionState::Paired) / 2) as u64,
            total_pairings: self.total_pairings,
            total_skips: self.total_skips,
            total_disconnects: self.total_disconnects,
            notifications_dropped: 0,
        }
    }

    /// Verify the structural invariants. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(waiting) = self.slot.peek() {
            match self.registry.get(&waiting) {
                None => return Err(format!("slot holds unregistered {waiting}")),
                Some(c) if c.state != ConnectionState::Waiting => {
                    return Err(format!("slot holds {waiting} in state {:?}", c.state));
                }
                Some(c) if c.partner.is_some() => {
                    return Err(format!("slot holds {waiting} which has a partner"));
                }
                Some(_) => {}
            }
        }

        for conn in self.registry.iter() {
            if conn.state == ConnectionState::Closed {
                return Err(format!("closed connection {} still registered", conn.id));
            }
            if conn.state == ConnectionState::Waiting && !self.slot.holds(&conn.id) {
                return Err(format!("{} is waiting outside the slot", conn.id));
            }
            match conn.partner {
                Some(partner_id) => {
                    if partner_id == conn.id {
                        return Err(format!("{} is paired with itself", conn.id));
                    }
                    let Some(partner) = self.registry.get(&partner_id) else {
                        return Err(format!("{} points at missing {partner_id}", conn.id));
                    };
                    if partner.partner != Some(conn.id) {
                        return Err(format!("link {} -> {partner_id} is not symmetric", conn.id));
                    }
                    if conn.state != ConnectionState::Paired {
                        return Err(format!("{} has a partner but is {:?}", conn.id, conn.state));
                    }
                }
                None if conn.state == ConnectionState::Paired => {
                    return Err(format!("{} is paired without a partner", conn.id));
                }
                None => {}
            }
        }
        Ok(())
    }

    fn link(&mut self, a: ConnectionId, b: ConnectionId) {
        for (this, other) in [(a, b), (b, a)] {
            if let Some(conn) = self.registry.get_mut(&this) {
                conn.partner = Some(other);
                conn.state = ConnectionState::Paired;
            }
        }
    }

    /// Clear `partner_id`'s side of the link to `from`. Returns false if
    /// the partner is gone or no longer linked back.
    fn sever_from(&mut self, partner_id: &ConnectionId, from: &ConnectionId) -> bool {
        match self.registry.get_mut(partner_id) {
            Some(partner) if partner.partner.as_ref() == Some(from) => {
                partner.unlink();
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, id: &ConnectionId, state: ConnectionState) {
        if let Some(conn) = self.registry.get_mut(id) {
            conn.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(state: &mut MatchState) -> ConnectionId {
        let id = ConnectionId::new();
        assert!(state.connect(id));
        id
    }

    fn paired_pair(state: &mut MatchState) -> (ConnectionId, ConnectionId) {
        let a = connected(state);
        let b = connected(state);
        state.request_pair(a);
        let (paired, _) = state.request_pair(b);
        assert!(paired);
        (a, b)
    }

    #[test]
    fn first_join_waits_second_pairs() {
        let mut state = MatchState::default();
        let c1 = connected(&mut state);
        let c2 = connected(&mut state);

        let (paired, outbox) = state.request_pair(c1);
        assert!(!paired);
        assert_eq!(outbox.for_connection(&c1), vec![&Notification::Waiting]);
        assert_eq!(state.waiting(), Some(c1));

        let (paired, outbox) = state.request_pair(c2);
        assert!(paired);
        assert_eq!(
            outbox.for_connection(&c1),
            vec![&Notification::Paired { partner_id: c2 }]
        );
        assert_eq!(
            outbox.for_connection(&c2),
            vec![&Notification::Paired { partner_id: c1 }]
        );
        assert!(state.waiting().is_none());
        assert_eq!(state.partner_of(&c1), Some(c2));
        assert_eq!(state.partner_of(&c2), Some(c1));
        state.check_invariants().unwrap();
    }

    #[test]
    fn third_join_after_pair_waits() {
        let mut state = MatchState::default();
        let c1 = connected(&mut state);
        let c2 = connected(&mut state);
        let c3 = connected(&mut state);

        state.request_pair(c1);
        let (paired, _) = state.request_pair(c3);
        assert!(paired);
        assert_eq!(state.partner_of(&c1), Some(c3));

        let (paired, outbox) = state.request_pair(c2);
        assert!(!paired);
        assert_eq!(outbox.for_connection(&c2), vec![&Notification::Waiting]);
        assert_eq!(state.waiting(), Some(c2));
        state.check_invariants().unwrap();
    }

    #[test]
    fn repeated_join_while_waiting_renotifies() {
        let mut state = MatchState::default();
        let c1 = connected(&mut state);

        state.request_pair(c1);
        let (paired, outbox) = state.request_pair(c1);
        assert!(!paired);
        assert_eq!(outbox.for_connection(&c1), vec![&Notification::Waiting]);
        assert_eq!(state.waiting(), Some(c1));
        assert_eq!(state.partner_of(&c1), None);
        state.check_invariants().unwrap();
    }

    #[test]
    fn join_while_paired_is_noop() {
        let mut state = MatchState::default();
        let (a, b) = paired_pair(&mut state);
        let c = connected(&mut state);
        state.request_pair(c);

        let (paired, outbox) = state.request_pair(a);
        assert!(!paired);
        assert!(outbox.is_empty());
        assert_eq!(state.partner_of(&a), Some(b));
        assert_eq!(state.waiting(), Some(c));
        state.check_invariants().unwrap();
    }

    #[test]
    fn join_from_unknown_connection_is_ignored() {
        let mut state = MatchState::default();
        let (paired, outbox) = state.request_pair(ConnectionId::new());
        assert!(!paired);
        assert!(outbox.is_empty());
        assert!(state.waiting().is_none());
    }

    #[test]
    fn stale_slot_occupant_is_evicted() {
        let mut state = MatchState::default();
        let stale = connected(&mut state);
        let fresh = connected(&mut state);

        state.request_pair(stale);
        // Simulate corruption: occupant no longer in Waiting
        state.force_state(&stale, ConnectionState::Idle);

        let (paired, outbox) = state.request_pair(fresh);
        assert!(!paired);
        assert_eq!(state.waiting(), Some(fresh));
        assert_eq!(outbox.for_connection(&fresh), vec![&Notification::Waiting]);
        assert!(outbox.for_connection(&stale).is_empty());
        state.check_invariants().unwrap();
    }

    #[test]
    fn unregistered_slot_occupant_is_evicted() {
        let mut state = MatchState::default();
        let ghost = ConnectionId::new();
        state.slot.occupy(ghost);
        let c1 = connected(&mut state);

        let (paired, _) = state.request_pair(c1);
        assert!(!paired);
        assert_eq!(state.waiting(), Some(c1));
        state.check_invariants().unwrap();
    }

    #[test]
    fn skip_notifies_both_sides_and_requeues() {
        let mut state = MatchState::default();
        let (a, b) = paired_pair(&mut state);
        let c = connected(&mut state);
        state.request_pair(c);

        let outbox = state.skip(a);

        // Partner re-queued first: it takes the waiting connection
        assert_eq!(
            outbox.for_connection(&b),
            vec![
                &Notification::PartnerSkipped,
                &Notification::ClearChat,
                &Notification::Paired { partner_id: c },
            ]
        );
        assert_eq!(
            outbox.for_connection(&a),
            vec![&Notification::ClearChat, &Notification::Waiting]
        );
        assert_eq!(state.partner_of(&b), Some(c));
        assert_eq!(state.waiting(), Some(a));
        assert!(!outbox.for_connection(&b).contains(&&Notification::PartnerDisconnected));
        state.check_invariants().unwrap();
    }

    #[test]
    fn skip_with_empty_slot_rematches_same_partner() {
        let mut state = MatchState::default();
        let (a, b) = paired_pair(&mut state);

        let outbox = state.skip(a);

        assert_eq!(
            outbox.for_connection(&b),
            vec![
                &Notification::PartnerSkipped,
                &Notification::ClearChat,
                &Notification::Waiting,
                &Notification::Paired { partner_id: a },
            ]
        );
        assert_eq!(state.partner_of(&a), Some(b));
        assert_eq!(state.stats().total_pairings, 2);
        state.check_invariants().unwrap();
    }

    #[test]
    fn skip_severs_before_requeue() {
        let mut state = MatchState::default();
        let (a, b) = paired_pair(&mut state);
        let c = connected(&mut state);
        let d = connected(&mut state);
        state.request_pair(c);

        // Both a and b find new partners; neither is linked to the other
        state.skip(a);
        state.request_pair(d);
        assert_ne!(state.partner_of(&a), Some(b));
        assert_ne!(state.partner_of(&b), Some(a));
        assert_eq!(state.partner_of(&a), Some(d));
        state.check_invariants().unwrap();
    }

    #[test]
    fn skip_while_not_paired_is_noop() {
        let mut state = MatchState::default();
        let a = connected(&mut state);
        assert!(state.skip(a).is_empty());

        state.request_pair(a);
        assert!(state.skip(a).is_empty());
        assert_eq!(state.waiting(), Some(a));
        assert_eq!(state.stats().total_skips, 0);
    }

    #[test]
    fn disconnect_while_paired_notifies_partner_once() {
        let mut state = MatchState::default();
        let (a, b) = paired_pair(&mut state);
        let c = connected(&mut state);
        state.request_pair(c);

        let outbox = state.disconnect(a);

        let to_b = outbox.for_connection(&b);
        assert_eq!(
            to_b.iter()
                .filter(|n| ***n == Notification::PartnerDisconnected)
                .count(),
            1
        );
        assert_eq!(state.partner_of(&b), None);
        assert_eq!(
            state.connection(&b).unwrap().state,
            ConnectionState::Idle
        );
        // Not re-queued, slot untouched
        assert_eq!(state.waiting(), Some(c));
        assert!(state.connection(&a).is_none());
        state.check_invariants().unwrap();
    }

    #[test]
    fn disconnect_while_waiting_clears_slot() {
        let mut state = MatchState::default();
        let a = connected(&mut state);
        state.request_pair(a);

        let outbox = state.disconnect(a);
        assert!(outbox.is_empty());
        assert!(state.waiting().is_none());
        assert!(state.registry().is_empty());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut state = MatchState::default();
        let (a, _b) = paired_pair(&mut state);

        state.disconnect(a);
        let again = state.disconnect(a);
        assert!(again.is_empty());
        assert_eq!(state.stats().total_disconnects, 1);
        state.check_invariants().unwrap();
    }

    #[test]
    fn partner_can_rejoin_after_disconnect() {
        let mut state = MatchState::default();
        let (a, b) = paired_pair(&mut state);
        state.disconnect(a);

        let c = connected(&mut state);
        state.request_pair(b);
        let (paired, _) = state.request_pair(c);
        assert!(paired);
        assert_eq!(state.partner_of(&b), Some(c));
    }

    #[test]
    fn duplicate_connect_rejected() {
        let mut state = MatchState::default();
        let a = connected(&mut state);
        assert!(!state.connect(a));
    }

    #[test]
    fn stats_reflect_state() {
        let mut state = MatchState::default();
        let (a, _b) = paired_pair(&mut state);
        let c = connected(&mut state);
        state.request_pair(c);
        state.skip(a);

        let stats = state.stats();
        assert_eq!(stats.connections, 3);
        assert_eq!(stats.active_pairs, 1);
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.total_skips, 1);
        assert_eq!(stats.total_pairings, 2);
    }

    #[test]
    fn invariant_checker_detects_asymmetric_link() {
        let mut state = MatchState::default();
        let a = connected(&mut state);
        let b = connected(&mut state);
        {
            let conn = state.registry.get_mut(&a).unwrap();
            conn.partner = Some(b);
            conn.state = ConnectionState::Paired;
        }
        assert!(state.check_invariants().is_err());
    }
}
