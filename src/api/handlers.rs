//! API Handlers
//!
//! Entity handlers are generic over [`Entity`] and mounted once per
//! collection. Reads go through a cached fetch binding, so a live cache entry
//! answers without touching the backend; writes go through
//! [`EntityActions`], which invalidates the affected keys.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::entities::{Backend, Entity, EntityActions, MemoryBackend};
use crate::error::{AppError, Result};
use crate::fetch::{FetchBinding, Fetchable};
use crate::models::{
    CacheValueResponse, ClearResponse, DeleteResponse, HealthResponse, InvalidateRequest,
    InvalidateResponse, ListQuery, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide cache store
    pub cache: CacheStore,
    pub backend: Arc<dyn Backend>,
}

impl AppState {
    pub fn new(cache: CacheStore, backend: Arc<dyn Backend>) -> Self {
        Self { cache, backend }
    }

    /// Builds the cache from configuration over an empty in-process backend.
    pub fn from_config(config: &Config) -> Self {
        let cache = CacheStore::new(config.cache_options());
        Self::new(cache, Arc::new(MemoryBackend::new()))
    }

    pub fn actions<E: Entity>(&self) -> EntityActions<E> {
        EntityActions::new(self.backend.clone(), self.cache.clone())
    }
}

/// Activates `binding` and turns its final state into a response.
async fn resolve<T: Fetchable>(
    binding: FetchBinding<T>,
    what: impl FnOnce() -> String,
) -> Result<Json<T>> {
    binding.activate().await;
    let state = binding.state();
    if state.error {
        return Err(AppError::Backend(format!("failed to load {}", what())));
    }
    state
        .data
        .map(Json)
        .ok_or_else(|| AppError::NotFound(what()))
}

// == Entity Handlers ==

/// `GET /<entities>` with optional `?scope=<parent_id>`
pub async fn list_handler<E: Entity>(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<E>>> {
    if query.scope.is_some() && E::SCOPE_COLUMN.is_none() {
        return Err(AppError::InvalidRequest(format!(
            "{} cannot be scoped",
            E::LIST_KEY
        )));
    }

    let binding = state.actions::<E>().bind_many(query.scope);
    resolve(binding, || E::LIST_KEY.to_string()).await
}

/// `GET /<entities>/:id`
pub async fn get_handler<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<E>> {
    let binding = state.actions::<E>().bind_one(id);
    resolve(binding, || format!("{} {}", E::KEY, id)).await
}

/// `POST /<entities>`
pub async fn create_handler<E: Entity>(
    State(state): State<AppState>,
    Json(payload): Json<E::New>,
) -> Result<(StatusCode, Json<E>)> {
    let created = state.actions::<E>().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PATCH /<entities>/:id`
pub async fn update_handler<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<E::Patch>,
) -> Result<Json<E>> {
    let updated = state.actions::<E>().update(id, &patch).await?;
    Ok(Json(updated))
}

/// `DELETE /<entities>/:id`
pub async fn delete_handler<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.actions::<E>().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// == Cache Handlers ==

/// `GET /cache/stats`
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().into())
}

/// `DELETE /cache`
///
/// Drops every entry without notifying subscribers.
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.cache.len();
    state.cache.clear();
    Json(ClearResponse::new(cleared))
}

/// `GET /cache/keys/:key`
pub async fn get_key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CacheValueResponse>> {
    let value = state
        .cache
        .get_value(&key)
        .ok_or_else(|| AppError::NotFound(format!("cache key '{}'", key)))?;
    Ok(Json(CacheValueResponse::new(key, value)))
}

/// `DELETE /cache/keys/:key`
///
/// Subscribers to `key` are notified even when nothing was cached.
pub async fn delete_key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    state.cache.delete(&key);
    Json(DeleteResponse::new(key))
}

/// `POST /cache/invalidate`
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(AppError::InvalidRequest(error_msg));
    }

    let removed = state.cache.invalidate(&req.pattern);
    debug!(pattern = %req.pattern, removed, "Invalidated over HTTP");
    Ok(Json(InvalidateResponse {
        pattern: req.pattern,
        removed,
    }))
}

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
