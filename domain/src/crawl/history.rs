//! Bounded crawl event history

use super::event::CrawlEvent;
use std::collections::VecDeque;

/// Default number of events kept per job.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Ordered ring buffer of crawl events.
///
/// Once `capacity` is reached the oldest event is evicted for each new one.
#[derive(Debug, Clone, PartialEq)]
pub struct EventHistory {
    events: VecDeque<CrawlEvent>,
    capacity: usize,
    evicted: u64,
}

impl EventHistory {
    /// Create a history holding at most `capacity` events (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, event: CrawlEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.evicted += 1;
        }
        self.events.push_back(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CrawlEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of events dropped to respect the capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn to_vec(&self) -> Vec<CrawlEvent> {
        self.events.iter().cloned().collect()
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}
