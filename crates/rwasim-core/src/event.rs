//! Simulation events and the priority queue that orders them.
//!
//! Events dequeue by timestamp, then by kind (see [`SimEvent::rank`]),
//! then by session and sequence. Anything still tied leaves in insertion
//! order, so a run is reproducible for a fixed seed.

use crate::error::FatalError;
use crate::request::{CollisionNotice, Confirmation, ConnectionRequest, Probe, Teardown};
use rwasim_algorithms::SessionId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Events in the discrete-event simulation.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// Start traffic on the active workstations.
    Activate,
    /// End of the run: verify that every wavelength was released.
    Deactivate,
    /// Smooth link usage for LORA and PABR.
    UpdateUsage,
    /// A workstation asks for a lightpath.
    Request(ConnectionRequest),
    /// A probe finished crossing one edge.
    Probe(Probe),
    /// A confirmation reached the next router towards the source.
    Confirmation(Confirmation),
    /// A collision notice reached the next router towards the destination.
    Collision(CollisionNotice),
    /// A teardown reached the next router on the path.
    Teardown(Teardown),
}

impl SimEvent {
    /// Tie-break order between kinds at the same timestamp.
    pub fn rank(&self) -> u8 {
        match self {
            SimEvent::Activate => 0,
            SimEvent::Deactivate => 1,
            SimEvent::UpdateUsage => 2,
            SimEvent::Request(_) => 3,
            SimEvent::Probe(_) => 4,
            SimEvent::Confirmation(_) => 5,
            SimEvent::Collision(_) => 6,
            SimEvent::Teardown(_) => 7,
        }
    }

    /// Session and probe sequence used to break ties within a kind.
    pub fn session_key(&self) -> (SessionId, usize) {
        match self {
            SimEvent::Activate | SimEvent::Deactivate | SimEvent::UpdateUsage => (0, 0),
            SimEvent::Request(r) => (r.session, 0),
            SimEvent::Probe(p) => (p.request.session, p.attempt.sequence),
            SimEvent::Confirmation(c) => (c.request.session, c.attempt.sequence),
            SimEvent::Collision(n) => (n.request.session, n.attempt.sequence),
            SimEvent::Teardown(t) => (t.request.session, 0),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SimEvent::Activate => "activate",
            SimEvent::Deactivate => "deactivate",
            SimEvent::UpdateUsage => "update_usage",
            SimEvent::Request(_) => "connection_request",
            SimEvent::Probe(_) => "probe",
            SimEvent::Confirmation(_) => "confirmation",
            SimEvent::Collision(_) => "collision",
            SimEvent::Teardown(_) => "teardown",
        }
    }
}

/// A timestamped event for the priority queue.
#[derive(Debug, Clone)]
struct TimedEvent {
    time: f64,
    rank: u8,
    session: SessionId,
    sequence: usize,
    insertion: u64,
    event: SimEvent,
}

impl TimedEvent {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.rank.cmp(&other.rank))
            .then(self.session.cmp(&other.session))
            .then(self.sequence.cmp(&other.sequence))
            .then(self.insertion.cmp(&other.insertion))
    }
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want min-heap
        other.key_cmp(self)
    }
}

/// Min-priority queue of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<TimedEvent>,
    insertion: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event. A NaN or infinite timestamp cannot be ordered.
    pub fn push(&mut self, time: f64, event: SimEvent) -> Result<(), FatalError> {
        if !time.is_finite() {
            return Err(FatalError::PriorityQueue(time));
        }
        let (session, sequence) = event.session_key();
        self.heap.push(TimedEvent {
            time,
            rank: event.rank(),
            session,
            sequence,
            insertion: self.insertion,
            event,
        });
        self.insertion += 1;
        Ok(())
    }

    /// Remove the earliest event.
    pub fn pop(&mut self) -> Option<(f64, SimEvent)> {
        self.heap.pop().map(|t| (t.time, t.event))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(session: SessionId) -> SimEvent {
        SimEvent::Request(ConnectionRequest {
            session,
            src: 0,
            dest: 1,
            workstation: None,
            duration: None,
        })
    }

    #[test]
    fn test_orders_by_time_then_kind() {
        let mut q = EventQueue::new();
        q.push(1.0, request(0)).unwrap();
        q.push(0.5, SimEvent::UpdateUsage).unwrap();
        q.push(0.5, SimEvent::Deactivate).unwrap();
        q.push(0.5, request(9)).unwrap();
        q.push(0.5, request(2)).unwrap();
        q.push(0.5, SimEvent::Activate).unwrap();

        let order: Vec<String> = std::iter::from_fn(|| q.pop())
            .map(|(t, e)| format!("{}:{}:{}", t, e.kind_name(), e.session_key().0))
            .collect();
        assert_eq!(
            order,
            vec![
                "0.5:activate:0",
                "0.5:deactivate:0",
                "0.5:update_usage:0",
                "0.5:connection_request:2",
                "0.5:connection_request:9",
                "1:connection_request:0",
            ]
        );
    }

    #[test]
    fn test_rejects_non_finite_time() {
        let mut q = EventQueue::new();
        assert!(matches!(
            q.push(f64::NAN, SimEvent::Activate),
            Err(FatalError::PriorityQueue(_))
        ));
        assert_eq!(
            q.push(f64::INFINITY, SimEvent::Activate).map_err(|e| e.code()),
            Err(-22)
        );
        assert!(q.is_empty());
    }

    #[test]
    fn test_equal_keys_pop_fifo() {
        let mut q = EventQueue::new();
        q.push(3.0, SimEvent::UpdateUsage).unwrap();
        q.push(3.0, SimEvent::UpdateUsage).unwrap();
        assert_eq!(q.len(), 2);
        let first = q.heap.peek().map(|t| t.insertion);
        assert_eq!(first, Some(0));
    }

    proptest! {
        #[test]
        fn prop_pops_are_non_decreasing(
            items in prop::collection::vec((0.0f64..100.0, 0u64..20), 1..200)
        ) {
            let mut q = EventQueue::new();
            for &(t, s) in &items {
                q.push(t, request(s)).unwrap();
            }
            let mut last: Option<(f64, SessionId)> = None;
            while let Some((t, e)) = q.pop() {
                let s = e.session_key().0;
                if let Some((lt, ls)) = last {
                    prop_assert!(t > lt || (t == lt && s >= ls));
                }
                last = Some((t, s));
            }
        }
    }
}
