//! MuzLoto - cache-coherent data access for a music-bingo event service
//!
//! An in-memory TTL cache with wildcard invalidation and change
//! notification, async fetch bindings on top of it, entity actions that keep
//! both consistent with mutations, and an HTTP API exposing all of it.

pub mod api;
pub mod cache;
pub mod config;
pub mod entities;
pub mod error;
pub mod fetch;
pub mod models;

pub use api::AppState;
pub use cache::{CacheOptions, CacheStore};
pub use config::Config;
