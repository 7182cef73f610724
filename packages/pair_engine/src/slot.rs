use crate::connection::ConnectionId;

/// Single-capacity holding area for the next connection to be matched
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WaitingSlot {
    occupant: Option<ConnectionId>,
}

impl WaitingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self) -> Option<ConnectionId> {
        self.occupant
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    pub fn holds(&self, id: &ConnectionId) -> bool {
        self.occupant.as_ref() == Some(id)
    }

    /// Put `id` in the slot. Callers must have emptied it first.
    pub(crate) fn occupy(&mut self, id: ConnectionId) {
        debug_assert!(self.occupant.is_none(), "waiting slot already occupied");
        self.occupant = Some(id);
    }

    pub(crate) fn take(&mut self) -> Option<ConnectionId> {
        self.occupant.take()
    }

    /// Empty the slot only if `id` is the occupant
    pub(crate) fn release(&mut self, id: &ConnectionId) -> bool {
        if self.holds(id) {
            self.occupant = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupy_and_take() {
        let mut slot = WaitingSlot::new();
        let id = ConnectionId::new();
        assert!(slot.is_empty());

        slot.occupy(id);
        assert!(slot.holds(&id));
        assert_eq!(slot.peek(), Some(id));

        assert_eq!(slot.take(), Some(id));
        assert!(slot.is_empty());
    }

    #[test]
    fn release_only_clears_matching_occupant() {
        let mut slot = WaitingSlot::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        slot.occupy(a);

        assert!(!slot.release(&b));
        assert!(slot.holds(&a));
        assert!(slot.release(&a));
        assert!(slot.is_empty());
    }
}
