//! The virtual-time event queue.

use crate::Time;
use rustc_hash::FxHashSet;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Identifies a scheduled event so it can be cancelled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u64);

/// A pending event queue ordered by `(time, insertion order)`.
///
/// Events scheduled for the same virtual time fire in the order they were
/// inserted. Cancellation leaves a tombstone that is discarded when the entry
/// surfaces, so `cancel` is constant time and calling it twice, or after the
/// event has fired, is a no-op.
#[derive(Debug)]
pub struct EventQueue<E> {
    heap: BinaryHeap<Reverse<Entry<E>>>,
    next_seq: u64,
    cancelled: FxHashSet<u64>,
    now: Time,
}

#[derive(Debug)]
struct Entry<E> {
    time: Time,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            cancelled: FxHashSet::default(),
            now: Time::ZERO,
        }
    }

    /// The virtual time of the most recently popped event.
    pub fn now(&self) -> Time {
        self.now
    }

    /// Schedules `event` to fire `delay` after the current virtual time.
    pub fn schedule(&mut self, delay: Time, event: E) -> EventHandle {
        self.schedule_at(self.now + delay, event)
    }

    /// Schedules `event` at an absolute virtual time. Times in the past are
    /// clamped to the present.
    pub fn schedule_at(&mut self, at: Time, event: E) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            time: at.max(self.now),
            seq,
            event,
        }));
        EventHandle(seq)
    }

    /// Cancels a pending event. Idempotent; cancelling an event that already
    /// fired does nothing.
    pub fn cancel(&mut self, handle: EventHandle) {
        if handle.0 < self.next_seq {
            self.cancelled.insert(handle.0);
        }
    }

    /// Removes and returns the next live event, advancing the clock to it.
    pub fn pop(&mut self) -> Option<(Time, E)> {
        while let Some(Reverse(entry)) = self.heap.pop() {
            if self.cancelled.remove(&entry.seq) {
                continue;
            }
            self.now = entry.time;
            return Some((entry.time, entry.event));
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.heap.len() <= self.cancelled.len()
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.schedule(Time::from_millis(30), "c");
        queue.schedule(Time::from_millis(10), "a");
        queue.schedule(Time::from_millis(20), "b");
        assert_eq!(queue.pop(), Some((Time::from_millis(10), "a")));
        assert_eq!(queue.pop(), Some((Time::from_millis(20), "b")));
        assert_eq!(queue.pop(), Some((Time::from_millis(30), "c")));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn ties_fire_in_insertion_order() {
        let mut queue = EventQueue::new();
        for label in ["first", "second", "third"] {
            queue.schedule(Time::from_secs(1), label);
        }
        assert_eq!(queue.pop().unwrap().1, "first");
        assert_eq!(queue.pop().unwrap().1, "second");
        assert_eq!(queue.pop().unwrap().1, "third");
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut queue = EventQueue::new();
        let keep = queue.schedule(Time::from_secs(1), "keep");
        let drop = queue.schedule(Time::from_secs(1), "drop");
        queue.cancel(drop);
        queue.cancel(drop);
        assert_eq!(queue.pop(), Some((Time::from_secs(1), "keep")));
        assert_eq!(queue.pop(), None);
        // cancelling after the fact is a no-op
        queue.cancel(keep);
        queue.schedule(Time::from_secs(2), "later");
        assert!(queue.pop().is_some());
    }

    #[test]
    fn clock_advances_with_pops() {
        let mut queue = EventQueue::new();
        queue.schedule(Time::from_secs(5), ());
        assert_eq!(queue.now(), Time::ZERO);
        queue.pop();
        assert_eq!(queue.now(), Time::from_secs(5));
        // relative scheduling is measured from the new clock
        queue.schedule(Time::from_secs(1), ());
        assert_eq!(queue.pop().unwrap().0, Time::from_secs(6));
    }
}
