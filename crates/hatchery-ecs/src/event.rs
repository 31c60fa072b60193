//! Per-entity lifecycle outbox.
//!
//! Components never talk to each other through a global event bus. Instead,
//! whoever drives an entity's lifecycle posts a [`LifecycleEvent`] into that
//! entity's [`Outbox`], and the world drains the outbox at a well-defined
//! point by calling [`World::deliver_events`](crate::world::World::deliver_events).
//! Delivery is synchronous, FIFO, and exactly-once per component: an event
//! leaves the outbox the moment it is handed out, so a second drain cannot
//! replay it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Lifecycle notifications a component may react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A pooled entity is being taken back into use. Components drop any
    /// state left behind by the previous occupant.
    Reuse,
    /// An active entity is being returned to its pool. Components release
    /// resources and clear per-occupant state.
    Recycle,
    /// Configuration finished and the entity is now live.
    Activated,
}

impl LifecycleEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::Reuse => "reuse",
            LifecycleEvent::Recycle => "recycle",
            LifecycleEvent::Activated => "activated",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// An event plus its position in the outbox's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: LifecycleEvent,
    /// Monotonic per-outbox sequence number, assigned on post.
    pub sequence: u64,
}

// ---------------------------------------------------------------------------
// DeliveryReport
// ---------------------------------------------------------------------------

/// Summary of one [`World::deliver_events`](crate::world::World::deliver_events) call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Events drained from the outbox.
    pub events: usize,
    /// Individual component deliveries (`events * components`).
    pub deliveries: usize,
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// FIFO queue of lifecycle events waiting to be delivered to one entity.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Envelope>,
    next_sequence: u64,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `event`, returning the sequence number it was given.
    pub fn post(&mut self, event: LifecycleEvent) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push_back(Envelope { event, sequence });
        sequence
    }

    /// Remove and return every queued envelope in posting order.
    pub fn drain(&mut self) -> Vec<Envelope> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total events ever posted to this outbox.
    pub fn posted(&self) -> u64 {
        self.next_sequence
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_posting_order() {
        let mut outbox = Outbox::new();
        outbox.post(LifecycleEvent::Recycle);
        outbox.post(LifecycleEvent::Reuse);
        outbox.post(LifecycleEvent::Activated);

        let drained = outbox.drain();
        let events: Vec<_> = drained.iter().map(|e| e.event).collect();
        assert_eq!(
            events,
            vec![
                LifecycleEvent::Recycle,
                LifecycleEvent::Reuse,
                LifecycleEvent::Activated
            ]
        );
        assert_eq!(drained[2].sequence, 2);
    }

    #[test]
    fn drained_events_are_not_replayed() {
        let mut outbox = Outbox::new();
        outbox.post(LifecycleEvent::Reuse);
        assert_eq!(outbox.drain().len(), 1);
        assert!(outbox.is_empty());
        assert!(outbox.drain().is_empty());
    }

    #[test]
    fn sequence_keeps_counting_across_drains() {
        let mut outbox = Outbox::new();
        outbox.post(LifecycleEvent::Reuse);
        outbox.drain();
        let seq = outbox.post(LifecycleEvent::Recycle);
        assert_eq!(seq, 1);
        assert_eq!(outbox.posted(), 2);
    }

    #[test]
    fn event_names_are_stable() {
        assert_eq!(LifecycleEvent::Reuse.as_str(), "reuse");
        let json = serde_json::to_string(&LifecycleEvent::Recycle).unwrap();
        assert_eq!(json, "\"Recycle\"");
    }
}
