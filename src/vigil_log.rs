//! Bounded, append-only activity log.
//!
//! Every producer (generators, operator actions, alerts) funnels through
//! [`LogBuffer::append`]. The buffer assigns ids, stamps entries and evicts the oldest
//! entries once it holds more than [`LOG_CAPACITY`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::vigil_core::{EntryId, LogEntry, Severity};

/// Maximum number of entries retained.
pub const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
    evicted: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    /// Buffer with a custom bound; a zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity + 1), capacity, next_id: 1, evicted: 0 }
    }

    /// Mint a new entry, append it and evict from the front until the bound holds.
    ///
    /// Append and eviction happen under the same `&mut self` borrow, so no reader can
    /// observe the buffer above capacity.
    pub fn append(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> LogEntry {
        let id = EntryId(self.next_id);
        self.next_id += 1;

        let entry = LogEntry::new(id, message.into(), timestamp, severity);
        self.entries.push_back(entry.clone());

        while self.entries.len() > self.capacity {
            if let Some(dropped) = self.entries.pop_front() {
                self.evicted += 1;
                debug!(id = %dropped.id(), "evicted log entry");
            }
        }

        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped by eviction since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn first(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn get(&self, index: usize) -> Option<&LogEntry> {
        self.entries.get(index)
    }

    /// Ordered copy for presentation.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    #[fixture]
    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[rstest]
    fn append_assigns_increasing_ids(epoch: DateTime<Utc>) {
        let mut buffer = LogBuffer::new();
        let first = buffer.append("one", Severity::Info, epoch);
        let second = buffer.append("two", Severity::Warning, epoch);

        assert!(first.id() < second.id());
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.last().map(LogEntry::message), Some("two"));
    }

    #[rstest]
    fn keeps_most_recent_fifty(epoch: DateTime<Utc>) {
        let mut buffer = LogBuffer::new();
        for n in 1..=55 {
            buffer.append(format!("event {n}"), Severity::Info, epoch);
        }

        assert_eq!(buffer.len(), LOG_CAPACITY);
        assert_eq!(buffer.evicted(), 5);
        assert_eq!(buffer.first().map(LogEntry::message), Some("event 6"));
        assert_eq!(buffer.last().map(LogEntry::message), Some("event 55"));

        let ids: Vec<u64> = buffer.iter().map(|entry| entry.id().get()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[rstest]
    #[case(0, 1)]
    #[case(3, 3)]
    fn custom_capacity_is_respected(
        epoch: DateTime<Utc>,
        #[case] requested: usize,
        #[case] effective: usize,
    ) {
        let mut buffer = LogBuffer::with_capacity(requested);
        for n in 0..10 {
            buffer.append(format!("{n}"), Severity::Info, epoch);
            assert!(buffer.len() <= effective);
        }
        assert_eq!(buffer.capacity(), effective);
        assert_eq!(buffer.len(), effective);
    }

    #[rstest]
    fn ids_keep_counting_after_eviction(epoch: DateTime<Utc>) {
        let mut buffer = LogBuffer::with_capacity(2);
        buffer.append("a", Severity::Info, epoch);
        buffer.append("b", Severity::Info, epoch);
        let third = buffer.append("c", Severity::Error, epoch);

        assert_eq!(third.id(), EntryId(3));
        assert_eq!(buffer.first().map(LogEntry::id), Some(EntryId(2)));
    }
}
