//! Text message and typing indicator relay between partners.
//!
//! Messages are validated, forwarded to the sender's partner and then
//! forgotten; nothing is stored.

use tracing::debug;

use crate::connection::ConnectionId;
use crate::error::RelayError;
use crate::notification::{Notification, Outbox};
use crate::state::MatchState;

/// Trim and length-check an inbound chat message.
///
/// Returns `Ok(None)` for blank input, which is dropped without telling
/// the sender. Length is counted in Unicode scalar values.
pub fn validate_message(raw: &str, max_chars: usize) -> Result<Option<&str>, RelayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max_chars {
        return Err(RelayError::MessageTooLong { max: max_chars });
    }
    Ok(Some(trimmed))
}

impl MatchState {
    /// Resolve the partner `sender` may relay to
    pub(crate) fn relay_target(&mut self, sender: &ConnectionId) -> Result<ConnectionId, RelayError> {
        let conn = self.registry.get(sender).ok_or(RelayError::NoPartner)?;
        if !conn.is_paired() {
            return Err(RelayError::NoPartner);
        }
        let partner = conn.partner.ok_or(RelayError::NoPartner)?;
        if !self.registry.is_live(&partner) {
            // Partner vanished without a disconnect transaction reaching us
            if let Some(conn) = self.registry.get_mut(sender) {
                conn.unlink();
            }
            return Err(RelayError::PartnerDisconnected);
        }
        Ok(partner)
    }

    /// Forward a chat message from `sender` to its partner.
    pub fn forward_message(&mut self, sender: ConnectionId, raw: &str) -> Outbox {
        let mut outbox = Outbox::new();
        if !self.registry.contains(&sender) {
            return outbox;
        }

        let text = match validate_message(raw, self.max_message_chars) {
            Ok(Some(text)) => text,
            Ok(None) => return outbox,
            Err(e) => {
                outbox.push(sender, Notification::error(e));
                return outbox;
            }
        };

        match self.relay_target(&sender) {
            Ok(partner) => {
                debug!(
                    from = %sender,
                    to = %partner,
                    "Relaying message: {}",
                    text.chars().take(50).collect::<String>()
                );
                outbox.push(partner, Notification::Message {
                    text: text.to_string(),
                });
            }
            Err(e) => outbox.push(sender, Notification::error(e)),
        }
        outbox
    }

    /// Forward a typing start/stop signal. No-op unless paired.
    pub fn typing(&mut self, sender: ConnectionId, typing: bool) -> Outbox {
        let mut outbox = Outbox::new();
        let paired = self.registry.get(&sender).is_some_and(|c| c.is_paired());
        if !paired {
            return outbox;
        }
        if let Ok(partner) = self.relay_target(&sender) {
            let signal = if typing {
                Notification::PartnerTyping
            } else {
                Notification::PartnerStopTyping
            };
            outbox.push(partner, signal);
        }
        outbox
    }
}
