//! Deterministic timer scheduling.
//!
//! The console never reads the wall clock directly. It owns a [`Scheduler`] whose time
//! only moves when the caller advances it, so tests can step simulated time and the
//! binary can feed real elapsed time into the same code path.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    pub id: TimerId,
    pub at: Duration,
    pub payload: T,
}

#[derive(Debug, Clone)]
struct TimerSlot<T> {
    payload: T,
    due: Duration,
    period: Option<Duration>,
}

/// Ordering key: deadline first, then registration order.
type QueueKey = (Duration, TimerId);

#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    queue: BTreeSet<QueueKey>,
    slots: HashMap<TimerId, TimerSlot<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self { now: Duration::ZERO, next_id: 0, queue: BTreeSet::new(), slots: HashMap::new() }
    }

    /// Simulated time since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.slots.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Deadline of the next timer, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.first().map(|(due, _)| *due)
    }

    pub fn schedule_once(&mut self, delay: Duration, payload: T) -> TimerId {
        self.insert(delay, None, payload)
    }

    /// First fire is one `period` from now. Periods shorter than 1 ms are raised to 1 ms.
    pub fn schedule_every(&mut self, period: Duration, payload: T) -> TimerId {
        let period = period.max(MIN_PERIOD);
        self.insert(period, Some(period), payload)
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.slots.remove(&id) {
            Some(slot) => {
                self.queue.remove(&(slot.due, id));
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.slots.len();
        self.slots.clear();
        self.queue.clear();
        count
    }

    /// Move the clock forward to `until`. Time never runs backwards.
    pub fn settle(&mut self, until: Duration) {
        if until > self.now {
            self.now = until;
        }
    }

    fn insert(&mut self, delay: Duration, period: Option<Duration>, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let due = self.now + delay;
        self.queue.insert((due, id));
        self.slots.insert(id, TimerSlot { payload, due, period });
        id
    }
}

impl<T: Clone> Scheduler<T> {
    /// Pop the earliest timer due at or before `until` and move the clock to its
    /// deadline. Periodic timers are re-armed one period later.
    pub fn pop_due(&mut self, until: Duration) -> Option<Fired<T>> {
        let (due, id) = *self.queue.first()?;
        if due > until {
            return None;
        }
        self.queue.remove(&(due, id));
        self.settle(due);

        let slot = self.slots.get_mut(&id)?;
        let payload = slot.payload.clone();
        match slot.period {
            Some(period) => {
                slot.due = due + period;
                self.queue.insert((slot.due, id));
            }
            None => {
                self.slots.remove(&id);
            }
        }

        Some(Fired { id, at: due, payload })
    }
}
