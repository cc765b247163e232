//! Fetch Module
//!
//! Bindings that connect async data sources to the shared cache.

mod binding;
mod subscription;

pub use binding::{
    CacheConfig, FetchBinding, FetchFuture, FetchOptions, FetchResponse, FetchState, Fetchable,
    Fetcher,
};
pub use subscription::{refresh_on_invalidate, CacheSubscription};
