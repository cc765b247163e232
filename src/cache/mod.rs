//! Cache Module
//!
//! In-memory caching with lazy TTL expiration, insertion-order eviction,
//! wildcard invalidation and subscriber notification.

mod entry;
pub(crate) mod lock;
mod notifier;
mod order;
pub mod pattern;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use notifier::{NotifyOutcome, Subscriber, Subscription};
pub use order::InsertionOrder;
pub use pattern::{matches_subscription_key, matches_wildcard_pattern, pattern_to_matcher};
pub use stats::CacheStats;
pub use store::{CacheOptions, CacheStore, DEFAULT_MAX_SIZE, DEFAULT_TTL};
