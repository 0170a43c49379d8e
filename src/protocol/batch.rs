//! Per-turn envelope batching.

use super::Envelope;

/// Collects the envelopes one side produces during a turn.
///
/// With batching on, a turn that produced more than one envelope is sent as a
/// single [`Envelope::Batch`]; the receiving channel flattens it back in order.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Envelope>,
    batch: bool,
}

impl Outbox {
    pub fn new(batch: bool) -> Self {
        Self {
            queue: Vec::new(),
            batch,
        }
    }

    pub fn push(&mut self, envelope: Envelope) {
        self.queue.push(envelope);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take everything queued this turn, ready to hand to a channel.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let queued = std::mem::take(&mut self.queue);
        if self.batch && queued.len() > 1 {
            vec![Envelope::Batch { envelopes: queued }]
        } else {
            queued
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Coordinate;
    use crate::protocol::{Patch, ViewStateUpdate};

    fn update() -> Envelope {
        Envelope::ViewStateUpdate(ViewStateUpdate {
            coordinate: Coordinate::root(),
            patch: Patch::default().with_field("n", 1),
        })
    }

    #[test]
    fn test_single_envelope_is_not_wrapped() {
        let mut outbox = Outbox::new(true);
        outbox.push(update());
        let drained = outbox.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind(), "view_state_update");
    }

    #[test]
    fn test_turn_is_coalesced() {
        let mut outbox = Outbox::new(true);
        outbox.push(update());
        outbox.push(update());
        let drained = outbox.drain();
        assert_eq!(drained.len(), 1);
        assert!(matches!(&drained[0], Envelope::Batch { envelopes } if envelopes.len() == 2));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_batching_disabled() {
        let mut outbox = Outbox::new(false);
        outbox.push(update());
        outbox.push(update());
        assert_eq!(outbox.drain().len(), 2);
    }
}
