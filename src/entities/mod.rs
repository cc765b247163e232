//! Entities Module
//!
//! MuzLoto records, the backend they live in, and the action wrappers that
//! keep the cache consistent with mutations.
//!
//! # Cache key convention
//! - `"<entity>:<id>"` for a single record, e.g. `"track:7"`
//! - `"<entities>:all"` for an unfiltered list, e.g. `"projects:all"`
//! - `"<entities>:<parent_id>"` for a scoped list, e.g. `"tracks:42"`
//! - `"<entities>:*"` as the invalidation pattern for every list
//!
//! Partitioning by entity exists only through this naming.

mod actions;
mod backend;
mod models;

pub use actions::EntityActions;
pub use backend::{
    Backend, BackendError, BackendErrorKind, BackendResponse, Filter, MemoryBackend,
};
pub use models::{
    City, CityPatch, Event, EventPatch, Location, LocationPatch, NewCity, NewEvent, NewLocation,
    NewProject, NewRegistration, NewTrack, Project, ProjectPatch, Registration, RegistrationPatch,
    Track, TrackPatch,
};

use serde::de::DeserializeOwned;
use serde::Serialize;

// == Entity Trait ==
/// A top-level record type stored in a backend table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Create payload
    type New: Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Partial update payload; unset fields are left untouched
    type Patch: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Singular key prefix, e.g. `"track"`
    const KEY: &'static str;
    /// List key prefix, e.g. `"tracks"`
    const LIST_KEY: &'static str;
    /// Backend table name
    const TABLE: &'static str;
    /// Column that scopes lists to a parent record, if any
    const SCOPE_COLUMN: Option<&'static str> = None;

    fn id(&self) -> i64;
}

// == Key Helpers ==
/// `"<entity>:<id>"`
pub fn one_cache_key<E: Entity>(id: i64) -> String {
    format!("{}:{}", E::KEY, id)
}

/// `"<entities>:all"` or `"<entities>:<parent_id>"`
pub fn many_cache_key<E: Entity>(scope: Option<i64>) -> String {
    match scope {
        Some(parent) => format!("{}:{}", E::LIST_KEY, parent),
        None => format!("{}:all", E::LIST_KEY),
    }
}

/// `"<entities>:*"`
pub fn list_pattern<E: Entity>() -> String {
    format!("{}:*", E::LIST_KEY)
}
