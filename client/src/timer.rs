//! Keyed one-shot timers.
//!
//! Each timer belongs to a `(handler, interface)` pair and at most one
//! may be outstanding per pair: scheduling a key again replaces the
//! previous timer, and cancellation is synchronous and total.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

/// The timer handlers of the state machine, one per retransmission or
/// milestone routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Handler {
    SendDiscover,
    SendRequest,
    StateSelecting,
    StateBound,
    StateInit,
}

/// The handle a timer is scheduled and canceled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey {
    pub handler: Handler,
    pub iface: usize,
}

/// The timer facility the state machine schedules against.
pub trait Timers {
    /// Arms `key` to fire at the absolute UNIX second `at`, replacing
    /// any previously armed timer for the same key.
    fn schedule(&mut self, at: i64, key: TimerKey);
    /// Disarms `key`. A canceled timer never fires.
    fn cancel(&mut self, key: TimerKey);
}

/// The provided timer queue implementation: a binary heap with lazy
/// invalidation, driven by the dispatch loop.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(i64, TimerKey)>>,
    armed: HashMap<TimerKey, i64>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The earliest armed expiration time, if any.
    pub fn next_due(&mut self) -> Option<i64> {
        self.prune();
        self.heap.peek().map(|Reverse((at, _))| *at)
    }

    /// Takes the earliest timer that has expired by `now`.
    pub fn pop_due(&mut self, now: i64) -> Option<TimerKey> {
        self.prune();
        match self.heap.peek() {
            Some(Reverse((at, _))) if *at <= now => {}
            _ => return None,
        }
        let Reverse((_, key)) = self.heap.pop().expect("peeked above");
        self.armed.remove(&key);
        Some(key)
    }

    /// Drops heap entries whose key was canceled or rescheduled.
    fn prune(&mut self) {
        while let Some(Reverse((at, key))) = self.heap.peek() {
            if self.armed.get(key) == Some(at) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl Timers for TimerQueue {
    fn schedule(&mut self, at: i64, key: TimerKey) {
        self.armed.insert(key, at);
        self.heap.push(Reverse((at, key)));
    }

    fn cancel(&mut self, key: TimerKey) {
        self.armed.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(handler: Handler) -> TimerKey {
        TimerKey { handler, iface: 0 }
    }

    #[test]
    fn fires_in_time_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(20, key(Handler::SendRequest));
        queue.schedule(10, key(Handler::SendDiscover));
        assert_eq!(queue.next_due(), Some(10));
        assert_eq!(queue.pop_due(15), Some(key(Handler::SendDiscover)));
        assert_eq!(queue.pop_due(15), None);
        assert_eq!(queue.pop_due(25), Some(key(Handler::SendRequest)));
    }

    #[test]
    fn rescheduling_replaces_the_previous_timer() {
        let mut queue = TimerQueue::new();
        queue.schedule(10, key(Handler::SendDiscover));
        queue.schedule(30, key(Handler::SendDiscover));
        assert_eq!(queue.pop_due(20), None);
        assert_eq!(queue.pop_due(30), Some(key(Handler::SendDiscover)));
        assert_eq!(queue.pop_due(i64::max_value()), None);
    }

    #[test]
    fn canceled_timers_never_fire() {
        let mut queue = TimerQueue::new();
        queue.schedule(10, key(Handler::StateBound));
        queue.cancel(key(Handler::StateBound));
        assert_eq!(queue.next_due(), None);
        assert_eq!(queue.pop_due(100), None);
    }

    #[test]
    fn keys_are_per_interface() {
        let mut queue = TimerQueue::new();
        let first = TimerKey {
            handler: Handler::SendRequest,
            iface: 0,
        };
        let second = TimerKey {
            handler: Handler::SendRequest,
            iface: 1,
        };
        queue.schedule(10, first);
        queue.schedule(10, second);
        queue.cancel(first);
        assert_eq!(queue.pop_due(10), Some(second));
        assert_eq!(queue.pop_due(10), None);
    }
}
