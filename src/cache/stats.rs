//! Cache Statistics Module
//!
//! Tracks cache performance metrics and notification delivery counters.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent, expired or undecodable)
    pub misses: u64,
    /// Number of entries purged lazily because their TTL elapsed
    pub expirations: u64,
    /// Number of entries evicted to make room for a new key
    pub evictions: u64,
    /// Number of keys removed through `delete` or `invalidate`
    pub invalidations: u64,
    /// Number of subscriber callbacks invoked
    pub notifications_delivered: u64,
    /// Number of notifications dropped by the re-entrancy guard
    pub notifications_suppressed: u64,
    /// Number of subscriber callbacks that panicked
    pub subscriber_failures: u64,
    /// Current number of registered subscribers
    pub subscribers: usize,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// An expired entry counts as both a miss and an expiration.
    pub fn record_expiration(&mut self) {
        self.expirations += 1;
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_invalidations(&mut self, count: usize) {
        self.invalidations += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
