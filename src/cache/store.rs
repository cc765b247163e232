//! Cache Store Module
//!
//! Main cache engine: a key to entry map with lazy TTL expiry, insertion-order
//! eviction, wildcard invalidation and subscriber notification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::lock::mutex_lock;
use super::notifier::{Notifier, Subscription};
use super::pattern::pattern_to_matcher;
use crate::cache::{CacheEntry, CacheStats, InsertionOrder};

/// Default entry lifetime (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

/// Default maximum number of entries
pub const DEFAULT_MAX_SIZE: usize = 100;

// == Cache Options ==
/// Construction options for a [`CacheStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Default TTL for entries stored without an explicit one
    pub ttl: Duration,
    /// Maximum number of entries the store holds
    pub max_size: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, CacheEntry>,
    order: InsertionOrder,
    stats: CacheStats,
}

impl StoreState {
    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.remove(key);
            self.stats.set_total_entries(self.entries.len());
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct StoreInner {
    state: Mutex<StoreState>,
    notifier: Arc<Notifier>,
    default_ttl: Duration,
    max_size: usize,
}

// == Cache Store ==
/// Shared in-memory cache.
///
/// Cloning is cheap and every clone sees the same entries and subscribers.
/// Operations never fail and never hold the internal lock while subscriber
/// callbacks run, so callbacks may call back into the store.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

impl CacheStore {
    // == Constructor ==
    /// Creates an isolated store. A `max_size` of zero is treated as one.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                notifier: Arc::new(Notifier::new()),
                default_ttl: options.ttl,
                max_size: options.max_size.max(1),
            }),
        }
    }

    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            ttl: self.inner.default_ttl,
            max_size: self.inner.max_size,
        }
    }

    // == Get ==
    /// Retrieves a live entry decoded as `T`.
    ///
    /// Expired entries are purged on the spot without notifying subscribers.
    /// A payload that does not decode as `T` is reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read(key, |value| match <T as Deserialize>::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached payload has an unexpected shape");
                None
            }
        })
    }

    // == Get Value ==
    /// Retrieves a live entry as raw JSON.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.read(key, |value| Some(value.clone()))
    }

    fn read<R>(&self, key: &str, decode: impl FnOnce(&Value) -> Option<R>) -> Option<R> {
        let mut state = mutex_lock(&self.inner.state, "store.get");

        let Some(entry) = state.entries.get(key) else {
            state.stats.record_miss();
            debug!(key = %key, "Cache miss");
            return None;
        };

        if entry.is_expired() {
            state.remove(key);
            state.stats.record_expiration();
            debug!(key = %key, "Cache entry expired");
            return None;
        }

        let decoded = decode(&entry.data);
        if decoded.is_some() {
            state.stats.record_hit();
            debug!(key = %key, "Cache hit");
        } else {
            state.stats.record_miss();
        }
        decoded
    }

    // == Contains Key ==
    /// Returns true if a live entry exists. Does not purge or count.
    pub fn contains_key(&self, key: &str) -> bool {
        mutex_lock(&self.inner.state, "store.contains")
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Set ==
    /// Stores `data` under `key`, overwriting any previous entry.
    ///
    /// When the store is full and `key` is new, exactly one other entry is
    /// evicted first: the oldest by insertion order. Null payloads are not
    /// stored. Plain inserts never notify subscribers.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        data: &T,
        ttl: Option<Duration>,
    ) {
        let key = key.into();
        let value = match serde_json::to_value(data) {
            Ok(Value::Null) => {
                debug!(key = %key, "Ignoring null cache payload");
                return;
            }
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache payload could not be serialized");
                return;
            }
        };

        let ttl = ttl.unwrap_or(self.inner.default_ttl);
        let mut state = mutex_lock(&self.inner.state, "store.set");

        let is_new = !state.entries.contains_key(&key);
        if is_new && state.entries.len() >= self.inner.max_size {
            if let Some(evicted) = state.order.pop_oldest() {
                state.entries.remove(&evicted);
                state.stats.record_eviction();
                debug!(evicted = %evicted, inserting = %key, "Evicted cache entry");
            }
        }

        if is_new {
            state.order.push(&key);
        }
        state.entries.insert(key, CacheEntry::new(value, ttl));
        let len = state.entries.len();
        state.stats.set_total_entries(len);
    }

    // == Delete ==
    /// Removes `key` and notifies subscribers with it.
    ///
    /// Absence is not an error; subscribers are notified either way.
    pub fn delete(&self, key: &str) {
        {
            let mut state = mutex_lock(&self.inner.state, "store.delete");
            if state.remove(key) {
                state.stats.record_invalidations(1);
            }
        }
        self.inner.notifier.notify(&[key.to_string()]);
    }

    // == Clear ==
    /// Removes every entry. Subscribers are not notified.
    pub fn clear(&self) {
        let mut state = mutex_lock(&self.inner.state, "store.clear");
        let removed = state.entries.len();
        state.entries.clear();
        state.order.clear();
        state.stats.set_total_entries(0);
        debug!(removed, "Cache cleared");
    }

    // == Invalidate ==
    /// Deletes every key matching the wildcard `pattern` and notifies
    /// subscribers once per deleted key.
    ///
    /// Matches are collected and removed before any callback runs, so
    /// subscribers cannot disturb the set being invalidated.
    ///
    /// Returns the number of keys removed.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let matcher = pattern_to_matcher(pattern);

        let removed: Vec<String> = {
            let mut state = mutex_lock(&self.inner.state, "store.invalidate");
            let matched: Vec<String> = state
                .entries
                .keys()
                .filter(|key| matcher.is_match(key))
                .cloned()
                .collect();
            for key in &matched {
                state.remove(key);
            }
            state.stats.record_invalidations(matched.len());
            matched
        };

        debug!(pattern = %pattern, count = removed.len(), "Invalidated cache keys");
        if !removed.is_empty() {
            self.inner.notifier.notify(&removed);
        }
        removed.len()
    }

    // == Subscribe ==
    /// Registers a callback for deleted and invalidated keys.
    ///
    /// The returned handle deregisters on `unsubscribe()` or on drop.
    pub fn subscribe(&self, callback: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        self.inner.notifier.subscribe(Arc::new(callback))
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = {
            let state = mutex_lock(&self.inner.state, "store.stats");
            let mut stats = state.stats.clone();
            stats.set_total_entries(state.entries.len());
            stats
        };
        let notifier = &self.inner.notifier;
        stats.notifications_delivered = notifier.delivered();
        stats.notifications_suppressed = notifier.suppressed();
        stats.subscriber_failures = notifier.failures();
        stats.subscribers = notifier.subscriber_count();
        stats
    }

    // == Length ==
    /// Returns the number of physically present entries, expired or not.
    pub fn len(&self) -> usize {
        mutex_lock(&self.inner.state, "store.len").entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
