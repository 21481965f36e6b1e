use crate::reading::Reading;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Fixed-capacity, append-only ring of readings (oldest evicted first)
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    items: VecDeque<Reading>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, reading: Reading) {
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(reading);
    }

    /// Readings strictly newer than `cutoff`, oldest first
    pub fn since(&self, cutoff: DateTime<Utc>) -> Vec<Reading> {
        self.items
            .iter()
            .filter(|r| r.timestamp > cutoff)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.items.iter()
    }
}
