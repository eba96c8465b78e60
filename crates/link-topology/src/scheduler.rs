//! Single-threaded discrete-event scheduling

use crate::engine::PendingLink;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Periodic topology update
    Tick,
    /// A deferred inter-satellite link finishes acquisition
    CommitAcquisition(PendingLink),
}

/// Simulated clock plus the ability to queue future work
pub trait Scheduler {
    fn now(&self) -> Duration;

    fn schedule_at(&mut self, at: Duration, event: SimEvent);
}

#[derive(Debug)]
struct Scheduled {
    at: Duration,
    seq: u64,
    event: SimEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// Time-ordered event queue. Events at the same instant pop in insertion order.
#[derive(Debug, Default)]
pub struct EventQueue {
    now: Duration,
    seq: u64,
    heap: BinaryHeap<Reverse<Scheduled>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock to the next event and return it
    pub fn pop(&mut self) -> Option<(Duration, SimEvent)> {
        let Reverse(next) = self.heap.pop()?;
        self.now = next.at;
        Some((next.at, next.event))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Scheduler for EventQueue {
    fn now(&self) -> Duration {
        self.now
    }

    /// Times in the past are clamped to now
    fn schedule_at(&mut self, at: Duration, event: SimEvent) {
        let at = at.max(self.now);
        self.heap.push(Reverse(Scheduled {
            at,
            seq: self.seq,
            event,
        }));
        self.seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BodyId, Endpoint};

    #[test]
    fn test_pops_in_time_then_insertion_order() {
        let mut queue = EventQueue::new();
        queue.schedule_at(Duration::from_secs(30), SimEvent::Tick);
        queue.schedule_at(Duration::from_secs(15), SimEvent::Tick);
        let pending = PendingLink {
            a: Endpoint::new(BodyId::Satellite(0), 1),
            b: Endpoint::new(BodyId::Satellite(1), 3),
            decided_at: Duration::from_secs(13),
            decision_distance_km: 1200.0,
        };
        queue.schedule_at(Duration::from_secs(15), SimEvent::CommitAcquisition(pending.clone()));

        assert_eq!(queue.pop(), Some((Duration::from_secs(15), SimEvent::Tick)));
        assert_eq!(queue.now(), Duration::from_secs(15));
        assert_eq!(
            queue.pop(),
            Some((Duration::from_secs(15), SimEvent::CommitAcquisition(pending)))
        );
        assert_eq!(queue.pop(), Some((Duration::from_secs(30), SimEvent::Tick)));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_past_events_fire_now() {
        let mut queue = EventQueue::new();
        queue.schedule_at(Duration::from_secs(10), SimEvent::Tick);
        queue.pop();
        queue.schedule_at(Duration::from_secs(5), SimEvent::Tick);
        assert_eq!(queue.pop(), Some((Duration::from_secs(10), SimEvent::Tick)));
    }
}
