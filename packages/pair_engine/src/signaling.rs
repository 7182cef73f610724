//! WebRTC signaling pass-through.
//!
//! Offer/answer/ICE payloads are routed to the sender's partner untouched.
//! Without a live partner they are dropped; the sender is not told.

use tracing::debug;

use crate::connection::ConnectionId;
use crate::notification::{Notification, Outbox, SignalKind};
use crate::state::MatchState;

impl MatchState {
    pub fn forward_signal(
        &mut self,
        sender: ConnectionId,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Outbox {
        let mut outbox = Outbox::new();
        let has_partner = self.partner_of(&sender).is_some();
        if !has_partner {
            debug!(conn_id = %sender, kind = kind.as_str(), "Dropping signal without partner");
            return outbox;
        }
        match self.relay_target(&sender) {
            Ok(partner) => outbox.push(partner, Notification::Signal { kind, payload }),
            Err(e) => debug!(conn_id = %sender, kind = kind.as_str(), "Dropping signal: {}", e),
        }
        outbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signal_forwarded_unchanged() {
        let mut state = MatchState::default();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        state.connect(a);
        state.connect(b);
        state.request_pair(a);
        state.request_pair(b);

        let payload = json!({ "sdp": "v=0\r\n...", "type": "offer", "extra": [1, 2, 3] });
        let outbox = state.forward_signal(a, SignalKind::Offer, payload.clone());
        assert_eq!(
            outbox.for_connection(&b),
            vec![&Notification::Signal {
                kind: SignalKind::Offer,
                payload
            }]
        );
        assert!(outbox.for_connection(&a).is_empty());
    }

    #[test]
    fn signal_without_partner_dropped() {
        let mut state = MatchState::default();
        let a = ConnectionId::new();
        state.connect(a);
        state.request_pair(a);

        let outbox = state.forward_signal(a, SignalKind::IceCandidate, json!({"candidate": ""}));
        assert!(outbox.is_empty());
    }
}
