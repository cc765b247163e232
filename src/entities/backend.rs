//! Backend Interface
//!
//! The narrow fetch/mutate surface entity actions talk to. Rows are plain JSON
//! objects keyed by an integer `id`; every call answers with a
//! [`BackendResponse`] carrying either data or an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::cache::lock::mutex_lock;
use crate::error::AppError;

// == Backend Error ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// No row with the requested id
    NotFound,
    /// The payload was not acceptable
    Rejected,
    /// The backend could not be reached
    Unavailable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(table: &str, id: i64) -> Self {
        Self::new(BackendErrorKind::NotFound, format!("{table} row {id} does not exist"))
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err.kind {
            BackendErrorKind::NotFound => AppError::NotFound(err.message),
            BackendErrorKind::Rejected => AppError::InvalidRequest(err.message),
            BackendErrorKind::Unavailable => AppError::Backend(err.message),
        }
    }
}

// == Backend Response ==
/// Uniform answer shape: `data` on success, `error` on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse<T> {
    pub data: Option<T>,
    pub error: Option<BackendError>,
}

impl<T> BackendResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    pub fn err(error: BackendError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, BackendError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

// == Filter ==
/// Column-equality conditions, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }
}

// == Backend Trait ==
#[async_trait]
pub trait Backend: Send + Sync {
    /// `data: None` without an error when the row does not exist.
    async fn select_one(&self, table: &str, id: i64) -> BackendResponse<Value>;

    /// Matching rows in id order.
    async fn select_many(&self, table: &str, filter: &Filter) -> BackendResponse<Vec<Value>>;

    /// Assigns `id` and `created_at`; returns the stored row.
    async fn insert(&self, table: &str, row: Value) -> BackendResponse<Value>;

    /// Shallow-merges `patch` into the row; returns the updated row.
    async fn update(&self, table: &str, id: i64, patch: Value) -> BackendResponse<Value>;

    /// Returns the removed row.
    async fn delete(&self, table: &str, id: i64) -> BackendResponse<Value>;
}

// == Memory Backend ==
#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Value>,
}

/// In-process backend with one auto-increment table per name.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Table>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with [`BackendErrorKind::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    pub fn row_count(&self, table: &str) -> usize {
        mutex_lock(&self.tables, "backend.row_count")
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(BackendError::new(
                BackendErrorKind::Unavailable,
                "backend is unavailable",
            ));
        }
        Ok(())
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, BackendError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::new(
            BackendErrorKind::Rejected,
            format!("expected a JSON object, got {other}"),
        )),
    }
}

fn respond<T>(result: Result<T, BackendError>) -> BackendResponse<T> {
    match result {
        Ok(data) => BackendResponse::ok(data),
        Err(error) => BackendResponse::err(error),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select_one(&self, table: &str, id: i64) -> BackendResponse<Value> {
        if let Err(e) = self.check_available() {
            return BackendResponse::err(e);
        }
        let tables = mutex_lock(&self.tables, "backend.select_one");
        match tables.get(table).and_then(|t| t.rows.get(&id)) {
            Some(row) => BackendResponse::ok(row.clone()),
            None => BackendResponse::empty(),
        }
    }

    async fn select_many(&self, table: &str, filter: &Filter) -> BackendResponse<Vec<Value>> {
        if let Err(e) = self.check_available() {
            return BackendResponse::err(e);
        }
        let tables = mutex_lock(&self.tables, "backend.select_many");
        let rows: Vec<Value> = tables
            .get(table)
            .map(|t| {
                t.rows
                    .values()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        BackendResponse::ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> BackendResponse<Value> {
        respond(self.check_available().and_then(|()| {
            let mut fields = into_object(row)?;
            let mut tables = mutex_lock(&self.tables, "backend.insert");
            let entry = tables.entry(table.to_string()).or_default();

            entry.last_id += 1;
            let id = entry.last_id;
            fields.insert("id".to_string(), Value::from(id));
            fields
                .entry("created_at")
                .or_insert_with(|| Value::from(Utc::now().to_rfc3339()));

            let row = Value::Object(fields);
            entry.rows.insert(id, row.clone());
            debug!(table = %table, id, "Row inserted");
            Ok(row)
        }))
    }

    async fn update(&self, table: &str, id: i64, patch: Value) -> BackendResponse<Value> {
        respond(self.check_available().and_then(|()| {
            let patch = into_object(patch)?;
            let mut tables = mutex_lock(&self.tables, "backend.update");
            let row = tables
                .get_mut(table)
                .and_then(|t| t.rows.get_mut(&id))
                .ok_or_else(|| BackendError::not_found(table, id))?;

            if let Value::Object(fields) = &mut *row {
                for (column, value) in patch {
                    if column != "id" {
                        fields.insert(column, value);
                    }
                }
            }
            debug!(table = %table, id, "Row updated");
            Ok(row.clone())
        }))
    }

    async fn delete(&self, table: &str, id: i64) -> BackendResponse<Value> {
        respond(self.check_available().and_then(|()| {
            let mut tables = mutex_lock(&self.tables, "backend.delete");
            let row = tables
                .get_mut(table)
                .and_then(|t| t.rows.remove(&id))
                .ok_or_else(|| BackendError::not_found(table, id))?;
            debug!(table = %table, id, "Row deleted");
            Ok(row)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_ids_and_timestamps() {
        let backend = MemoryBackend::new();

        let first = backend.insert("cities", json!({"name": "Kazan"})).await;
        let second = backend.insert("cities", json!({"name": "Samara"})).await;

        let first = first.into_result().unwrap().unwrap();
        let second = second.into_result().unwrap().unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
        assert!(first["created_at"].is_string());
        assert_eq!(backend.row_count("cities"), 2);
    }

    #[tokio::test]
    async fn test_tables_have_independent_ids() {
        let backend = MemoryBackend::new();
        backend.insert("cities", json!({"name": "Kazan"})).await;
        let project = backend.insert("projects", json!({"name": "Hits"})).await;

        assert_eq!(project.data.unwrap()["id"], 1);
    }

    #[tokio::test]
    async fn test_select_one_missing_is_empty_not_error() {
        let backend = MemoryBackend::new();
        let response = backend.select_one("tracks", 99).await;
        assert_eq!(response, BackendResponse::empty());
    }

    #[tokio::test]
    async fn test_select_many_filters_by_column() {
        let backend = MemoryBackend::new();
        for (project, title) in [(42, "a"), (7, "b"), (42, "c")] {
            backend
                .insert("tracks", json!({"project_id": project, "title": title}))
                .await;
        }

        let rows = backend
            .select_many("tracks", &Filter::new().eq("project_id", 42))
            .await
            .data
            .unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["a", "c"]);

        let all = backend.select_many("tracks", &Filter::new()).await.data.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_id() {
        let backend = MemoryBackend::new();
        backend
            .insert("projects", json!({"name": "Hits", "rounds": 3}))
            .await;

        let updated = backend
            .update("projects", 1, json!({"rounds": 5, "id": 100}))
            .await
            .into_result()
            .unwrap()
            .unwrap();

        assert_eq!(updated["id"], 1);
        assert_eq!(updated["name"], "Hits");
        assert_eq!(updated["rounds"], 5);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_rows() {
        let backend = MemoryBackend::new();

        let update = backend.update("events", 3, json!({"title": "x"})).await;
        assert_eq!(update.error.unwrap().kind, BackendErrorKind::NotFound);

        let delete = backend.delete("events", 3).await;
        assert_eq!(delete.error.unwrap().kind, BackendErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_non_object_payload_is_rejected() {
        let backend = MemoryBackend::new();
        let response = backend.insert("cities", json!(["Kazan"])).await;
        assert_eq!(response.error.unwrap().kind, BackendErrorKind::Rejected);
        assert_eq!(backend.row_count("cities"), 0);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let backend = MemoryBackend::new();
        backend.insert("cities", json!({"name": "Kazan"})).await;
        backend.set_unavailable(true);

        let select = backend.select_one("cities", 1).await;
        assert_eq!(select.error.unwrap().kind, BackendErrorKind::Unavailable);
        let insert = backend.insert("cities", json!({"name": "Perm"})).await;
        assert_eq!(insert.error.unwrap().kind, BackendErrorKind::Unavailable);

        backend.set_unavailable(false);
        assert!(backend.select_one("cities", 1).await.data.is_some());
    }

    #[test]
    fn test_backend_error_displays_message() {
        let err = BackendError::not_found("tracks", 7);
        assert_eq!(err.to_string(), "tracks row 7 does not exist");
    }

    #[test]
    fn test_backend_error_maps_to_app_error() {
        let not_found: AppError = BackendError::not_found("cities", 1).into();
        assert!(matches!(not_found, AppError::NotFound(_)));

        let rejected: AppError = BackendError::new(BackendErrorKind::Rejected, "bad").into();
        assert!(matches!(rejected, AppError::InvalidRequest(_)));

        let down: AppError = BackendError::new(BackendErrorKind::Unavailable, "down").into();
        assert!(matches!(down, AppError::Backend(_)));
    }
}
