//! Insertion Order Module
//!
//! Tracks the order in which keys were first inserted, which decides the
//! eviction target when the store is full.

use std::collections::VecDeque;

// == Insertion Order ==
/// Keys in first-insertion order.
///
/// - Front = oldest insertion (next eviction target)
/// - Back = newest insertion
///
/// Reads and overwrites never reorder keys: eviction is deterministic given
/// insertion order, not access recency.
#[derive(Debug, Default)]
pub struct InsertionOrder {
    order: VecDeque<String>,
}

impl InsertionOrder {
    // == Push ==
    /// Records a newly inserted key at the back.
    ///
    /// Callers only push keys that are not already tracked.
    pub fn push(&mut self, key: &str) {
        self.order.push_back(key.to_string());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Pop Oldest ==
    /// Returns and removes the oldest inserted key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
    }
}
