use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, FixedOffset};

pub type JobId = u64;

/// A pending one-shot timer.
#[derive(Debug, Clone)]
pub struct TimerEntry<J> {
    pub id: JobId,
    pub fire_at: DateTime<FixedOffset>,
    pub job: J,
}

impl<J> PartialEq for TimerEntry<J> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.id == other.id
    }
}

impl<J> Eq for TimerEntry<J> {}

impl<J> PartialOrd for TimerEntry<J> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<J> Ord for TimerEntry<J> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal deadlines fire in insertion order.
        self.fire_at.cmp(&other.fire_at).then(self.id.cmp(&other.id))
    }
}

/// Min-heap of one-shot timers. Entries can be added but never removed
/// before they fire.
#[derive(Debug)]
pub struct TimerQueue<J> {
    heap: BinaryHeap<Reverse<TimerEntry<J>>>,
    next_id: JobId,
}

impl<J> Default for TimerQueue<J> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_id: 1,
        }
    }
}

impl<J> TimerQueue<J> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a timer and returns its id.
    pub fn schedule(&mut self, fire_at: DateTime<FixedOffset>, job: J) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Reverse(TimerEntry { id, fire_at, job }));
        id
    }

    pub fn next_deadline(&self) -> Option<DateTime<FixedOffset>> {
        self.heap.peek().map(|Reverse(entry)| entry.fire_at)
    }

    /// Removes and returns the earliest timer if it is due at `now`.
    pub fn pop_due(&mut self, now: DateTime<FixedOffset>) -> Option<TimerEntry<J>> {
        if self.next_deadline()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse(entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pending timers in firing order.
    pub fn pending(&self) -> Vec<&TimerEntry<J>> {
        let mut entries: Vec<&TimerEntry<J>> = self.heap.iter().map(|Reverse(entry)| entry).collect();
        entries.sort();
        entries
    }
}
