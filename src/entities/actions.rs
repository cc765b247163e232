//! Entity Action Wrappers
//!
//! Typed CRUD over a [`Backend`] table. Reads go straight to the backend (the
//! cache is consulted by bindings built with [`EntityActions::bind_one`] and
//! [`EntityActions::bind_many`]); mutations drop the affected cache entries.
//!
//! # Invalidation
//! - `create` invalidates `"<entities>:*"`
//! - `update` / `delete` delete `"<entity>:<id>"` and invalidate `"<entities>:*"`

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::backend::{Backend, BackendResponse, Filter};
use super::{list_pattern, many_cache_key, one_cache_key, Entity};
use crate::cache::CacheStore;
use crate::error::{AppError, Result};
use crate::fetch::{CacheConfig, FetchBinding, FetchOptions, FetchResponse, Fetcher};

pub struct EntityActions<E> {
    backend: Arc<dyn Backend>,
    cache: CacheStore,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityActions<E> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            cache: self.cache.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for EntityActions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityActions")
            .field("table", &E::TABLE)
            .finish_non_exhaustive()
    }
}

/// Logs a failed backend call and converts it for the caller.
fn checked<T>(response: BackendResponse<T>, entity: &str, op: &str) -> Result<Option<T>> {
    response.into_result().map_err(|e| {
        warn!(entity, op, error = %e, "Backend operation failed");
        AppError::from(e)
    })
}

fn decode<E: Entity>(row: Value) -> Result<E> {
    serde_json::from_value(row).map_err(AppError::from)
}

impl<E: Entity> EntityActions<E> {
    pub fn new(backend: Arc<dyn Backend>, cache: CacheStore) -> Self {
        Self {
            backend,
            cache,
            _entity: PhantomData,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    // == Reads ==
    /// `None` when the row does not exist.
    pub async fn find_one(&self, id: i64) -> Result<Option<E>> {
        let response = self.backend.select_one(E::TABLE, id).await;
        checked(response, E::KEY, "select_one")?
            .map(decode::<E>)
            .transpose()
    }

    pub async fn get_one(&self, id: i64) -> Result<E> {
        self.find_one(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", E::KEY, id)))
    }

    /// Every row, or only those under `scope` for entities with a parent.
    pub async fn get_many(&self, scope: Option<i64>) -> Result<Vec<E>> {
        let filter = match (scope, E::SCOPE_COLUMN) {
            (None, _) => Filter::new(),
            (Some(parent), Some(column)) => Filter::new().eq(column, parent),
            (Some(_), None) => {
                return Err(AppError::InvalidRequest(format!(
                    "{} cannot be scoped",
                    E::LIST_KEY
                )))
            }
        };

        let response = self.backend.select_many(E::TABLE, &filter).await;
        checked(response, E::LIST_KEY, "select_many")?
            .unwrap_or_default()
            .into_iter()
            .map(decode::<E>)
            .collect()
    }

    // == Mutations ==
    pub async fn create(&self, payload: &E::New) -> Result<E> {
        let row = serde_json::to_value(payload)?;
        let response = self.backend.insert(E::TABLE, row).await;
        let created = self.expect_row(checked(response, E::KEY, "insert")?)?;

        let removed = self.cache.invalidate(&list_pattern::<E>());
        info!(entity = E::KEY, id = created.id(), invalidated = removed, "Created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, patch: &E::Patch) -> Result<E> {
        let patch = serde_json::to_value(patch)?;
        let response = self.backend.update(E::TABLE, id, patch).await;
        let updated = self.expect_row(checked(response, E::KEY, "update")?)?;

        self.invalidate_record(id);
        info!(entity = E::KEY, id, "Updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let response = self.backend.delete(E::TABLE, id).await;
        checked(response, E::KEY, "delete")?;

        self.invalidate_record(id);
        info!(entity = E::KEY, id, "Deleted");
        Ok(())
    }

    fn expect_row(&self, row: Option<Value>) -> Result<E> {
        let row = row.ok_or_else(|| {
            AppError::Backend(format!("{} mutation returned no row", E::KEY))
        })?;
        decode(row)
    }

    fn invalidate_record(&self, id: i64) {
        self.cache.delete(&one_cache_key::<E>(id));
        let removed = self.cache.invalidate(&list_pattern::<E>());
        debug!(entity = E::KEY, id, lists = removed, "Record invalidated");
    }

    // == Fetchers ==
    /// Fetcher for a single record; a missing row resolves to `data: None`.
    pub fn fetch_one(&self, id: i64) -> Fetcher<E> {
        let actions = self.clone();
        Arc::new(move || {
            let actions = actions.clone();
            async move {
                let data = actions.find_one(id).await?;
                Ok::<_, anyhow::Error>(FetchResponse::new(data))
            }
            .boxed()
        })
    }

    pub fn fetch_many(&self, scope: Option<i64>) -> Fetcher<Vec<E>> {
        let actions = self.clone();
        Arc::new(move || {
            let actions = actions.clone();
            async move {
                let data = actions.get_many(scope).await?;
                Ok::<_, anyhow::Error>(FetchResponse::new(Some(data)))
            }
            .boxed()
        })
    }

    // == Bindings ==
    /// Inactive binding cached under `"<entity>:<id>"`.
    pub fn bind_one(&self, id: i64) -> FetchBinding<E> {
        let options = FetchOptions {
            cache: Some(CacheConfig::new(one_cache_key::<E>(id))),
            ..FetchOptions::default()
        };
        FetchBinding::from_fetcher(self.cache.clone(), options, self.fetch_one(id))
    }

    /// Inactive binding cached under the list key for `scope`.
    pub fn bind_many(&self, scope: Option<i64>) -> FetchBinding<Vec<E>> {
        let options = FetchOptions {
            cache: Some(CacheConfig::new(many_cache_key::<E>(scope))),
            ..FetchOptions::default()
        };
        FetchBinding::from_fetcher(self.cache.clone(), options, self.fetch_many(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use crate::entities::{
        MemoryBackend, NewProject, NewTrack, Project, ProjectPatch, Track, TrackPatch,
    };
    use crate::fetch::CacheSubscription;
    use std::sync::Mutex;

    fn setup() -> (Arc<MemoryBackend>, CacheStore) {
        (
            Arc::new(MemoryBackend::new()),
            CacheStore::new(CacheOptions::default()),
        )
    }

    fn tracks(backend: &Arc<MemoryBackend>, cache: &CacheStore) -> EntityActions<Track> {
        EntityActions::new(backend.clone(), cache.clone())
    }

    fn new_track(project_id: i64, title: &str) -> NewTrack {
        NewTrack {
            project_id,
            title: title.to_string(),
            artist: "Unknown".to_string(),
            ..NewTrack::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (backend, cache) = setup();
        let actions = tracks(&backend, &cache);

        let created = actions.create(&new_track(42, "Intro")).await.unwrap();
        let fetched = actions.get_one(created.id).await.unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.project_id, 42);
    }

    #[tokio::test]
    async fn test_get_one_missing_is_not_found() {
        let (backend, cache) = setup();
        let err = tracks(&backend, &cache).get_one(5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_many_scoped() {
        let (backend, cache) = setup();
        let actions = tracks(&backend, &cache);
        actions.create(&new_track(42, "a")).await.unwrap();
        actions.create(&new_track(7, "b")).await.unwrap();

        assert_eq!(actions.get_many(Some(42)).await.unwrap().len(), 1);
        assert_eq!(actions.get_many(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unscoped_entity_rejects_scope() {
        let (backend, cache) = setup();
        let projects: EntityActions<Project> = EntityActions::new(backend, cache);
        let err = projects.get_many(Some(1)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_create_invalidates_lists_only() {
        let (backend, cache) = setup();
        let actions = tracks(&backend, &cache);
        cache.set("tracks:all", &Vec::<i64>::new(), None);
        cache.set("track:1", &"cached", None);

        actions.create(&new_track(1, "x")).await.unwrap();

        assert!(!cache.contains_key("tracks:all"));
        assert!(cache.contains_key("track:1"));
    }

    #[tokio::test]
    async fn test_update_invalidates_record_and_lists() {
        let (backend, cache) = setup();
        let projects: EntityActions<Project> = EntityActions::new(backend, cache.clone());
        let project = projects
            .create(&NewProject {
                name: "Hits".to_string(),
                ..NewProject::default()
            })
            .await
            .unwrap();

        cache.set(one_cache_key::<Project>(project.id), &project, None);
        cache.set("projects:all", &vec![project.clone()], None);

        let patch = ProjectPatch {
            rounds: Some(4),
            ..ProjectPatch::default()
        };
        let updated = projects.update(project.id, &patch).await.unwrap();

        assert_eq!(updated.rounds, 4);
        assert_eq!(updated.name, "Hits");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache_alone() {
        let (backend, cache) = setup();
        let actions = tracks(&backend, &cache);
        cache.set("tracks:all", &Vec::<i64>::new(), None);

        let err = actions
            .update(9, &TrackPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        backend.set_unavailable(true);
        let err = actions.create(&new_track(1, "x")).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));

        assert!(cache.contains_key("tracks:all"));
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_cache() {
        let (backend, cache) = setup();
        let actions = tracks(&backend, &cache);
        let track = actions.create(&new_track(3, "Outro")).await.unwrap();
        cache.set(one_cache_key::<Track>(track.id), &track, None);

        actions.delete(track.id).await.unwrap();

        assert_eq!(backend.row_count("tracks"), 0);
        assert!(cache.get::<Track>(&one_cache_key::<Track>(track.id)).is_none());
        assert!(matches!(
            actions.delete(track.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_creating_track_refreshes_dependent_subscription() {
        let (backend, cache) = setup();
        let actions = tracks(&backend, &cache);
        cache.set("tracks:42", &Vec::<Track>::new(), None);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = CacheSubscription::new(&cache, ["tracks:42"], move |key| {
            sink.lock().unwrap().push(key.to_string());
        });

        actions.create(&new_track(42, "Intro")).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["tracks:42".to_string()]);
        assert!(cache.get::<Vec<Track>>("tracks:42").is_none());
    }

    #[tokio::test]
    async fn test_bind_one_uses_cache_after_first_fetch() {
        let (backend, cache) = setup();
        let actions = tracks(&backend, &cache);
        let track = actions.create(&new_track(1, "Cached")).await.unwrap();

        let first = actions.bind_one(track.id);
        first.activate().await;
        let second = actions.bind_one(track.id);
        second.activate().await;

        assert_eq!(first.fetch_count(), 1);
        assert_eq!(second.fetch_count(), 0);
        assert_eq!(second.data(), Some(track));
    }

    #[tokio::test]
    async fn test_bind_one_missing_row_is_empty() {
        let (backend, cache) = setup();
        let binding = tracks(&backend, &cache).bind_one(77);
        binding.activate().await;

        assert_eq!(binding.data(), None);
        assert!(!binding.error());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_bind_many_reports_backend_failure() {
        let (backend, cache) = setup();
        backend.set_unavailable(true);

        let binding = tracks(&backend, &cache).bind_many(Some(42));
        binding.activate().await;

        assert!(binding.error());
        assert_eq!(binding.data(), None);
    }
}
