//! Data-Fetch Binding
//!
//! Gives a consumer a `(data, error, pending, refresh)` view over an async
//! fetcher, optionally backed by the shared [`CacheStore`].
//!
//! # Triggers
//! - [`FetchBinding::activate`] (mount, or re-enable via `set_disabled(false)`)
//!   serves a live cache entry without touching `pending`/`error`, otherwise
//!   issues one network fetch.
//! - [`FetchBinding::refresh`] always fetches and writes the result straight
//!   into the cache with `set`, so other subscribers are not notified.
//!
//! # Overlapping fetches
//! Each fetch carries a request id. A response whose id is older than the
//! last applied one is discarded, so the most recently issued fetch wins even
//! if an older one resolves after it. `pending` stays true while any fetch is
//! outstanding.
//!
//! # Teardown
//! [`FetchBinding::close`] cancels in-flight fetches; nothing they produce is
//! applied afterwards.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::CacheStore;

// == Fetch Response ==
/// What a fetcher resolves to. `data: None` is a valid, empty answer.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse<T> {
    pub data: Option<T>,
}

impl<T> FetchResponse<T> {
    pub fn new(data: Option<T>) -> Self {
        Self { data }
    }
}

/// Boxed future returned by a fetcher.
pub type FetchFuture<T> = BoxFuture<'static, anyhow::Result<FetchResponse<T>>>;

/// Shared fetcher function.
pub type Fetcher<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Bounds every value handled by a binding must satisfy.
pub trait Fetchable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Fetchable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

// == Cache Config ==
/// Where a binding caches its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache key, e.g. `"project:7"` or `"tracks:42"`
    pub id: String,
    /// Entry TTL; the store default when None
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            enabled: true,
            id: id.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

// == Fetch Options ==
#[derive(Debug, Clone)]
pub struct FetchOptions<T> {
    /// Initial `data`
    pub default_value: Option<T>,
    /// While true, no fetch is ever issued
    pub disabled: bool,
    pub cache: Option<CacheConfig>,
}

impl<T> Default for FetchOptions<T> {
    fn default() -> Self {
        Self {
            default_value: None,
            disabled: false,
            cache: None,
        }
    }
}

// == Fetch State ==
/// Snapshot of what a consumer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub error: bool,
    pub pending: bool,
}

struct BindingInner<T> {
    store: CacheStore,
    fetcher: Fetcher<T>,
    cache: Option<CacheConfig>,
    disabled: AtomicBool,
    state: watch::Sender<FetchState<T>>,
    next_request: AtomicU64,
    last_applied: AtomicU64,
    in_flight: AtomicUsize,
    fetch_calls: AtomicU64,
    cancel: CancellationToken,
}

impl<T> Drop for BindingInner<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// == Fetch Binding ==
/// Cheaply cloneable handle; clones share state and cancellation.
pub struct FetchBinding<T> {
    inner: Arc<BindingInner<T>>,
}

impl<T> Clone for FetchBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for FetchBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchBinding")
            .field("cache", &self.inner.cache)
            .field("disabled", &self.inner.disabled.load(Ordering::Acquire))
            .field("closed", &self.inner.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<T: Fetchable> FetchBinding<T> {
    // == Constructor ==
    /// Builds an inactive binding. Call [`activate`](Self::activate) to mount it.
    pub fn new<F, Fut>(store: CacheStore, options: FetchOptions<T>, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<FetchResponse<T>>> + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || fetcher().boxed());
        Self::from_fetcher(store, options, fetcher)
    }

    pub fn from_fetcher(store: CacheStore, options: FetchOptions<T>, fetcher: Fetcher<T>) -> Self {
        let (state, _) = watch::channel(FetchState {
            data: options.default_value,
            error: false,
            pending: false,
        });

        Self {
            inner: Arc::new(BindingInner {
                store,
                fetcher,
                cache: options.cache,
                disabled: AtomicBool::new(options.disabled),
                state,
                next_request: AtomicU64::new(0),
                last_applied: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                fetch_calls: AtomicU64::new(0),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Builds the binding and activates it.
    pub async fn mount<F, Fut>(store: CacheStore, options: FetchOptions<T>, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<FetchResponse<T>>> + Send + 'static,
    {
        let binding = Self::new(store, options, fetcher);
        binding.activate().await;
        binding
    }

    // == Activate ==
    /// Mount trigger: exactly one of cache hit or network fetch.
    pub async fn activate(&self) {
        if self.is_disabled() || self.is_closed() {
            return;
        }

        if let Some(cache) = self.cache_config() {
            if let Some(data) = self.inner.store.get::<T>(&cache.id) {
                debug!(key = %cache.id, "Serving binding from cache");
                self.inner.state.send_modify(|state| state.data = Some(data));
                return;
            }
        }

        self.run_fetch().await;
    }

    // == Refresh ==
    /// Re-fetches regardless of the cache and overwrites the cached entry
    /// without notifying subscribers. No-op while disabled or closed.
    pub async fn refresh(&self) {
        if self.is_disabled() || self.is_closed() {
            return;
        }
        self.run_fetch().await;
    }

    // == Set Disabled ==
    /// Enabling a disabled binding activates it.
    pub async fn set_disabled(&self, disabled: bool) {
        let was_disabled = self.inner.disabled.swap(disabled, Ordering::AcqRel);
        if was_disabled && !disabled {
            self.activate().await;
        }
    }

    // == Close ==
    /// Tears the binding down and cancels in-flight fetches.
    pub fn close(&self) {
        if !self.inner.cancel.is_cancelled() {
            debug!(cache = ?self.inner.cache.as_ref().map(|c| &c.id), "Closing fetch binding");
            self.inner.cancel.cancel();
        }
    }

    // == Accessors ==
    pub fn state(&self) -> FetchState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn error(&self) -> bool {
        self.inner.state.borrow().error
    }

    pub fn pending(&self) -> bool {
        self.inner.state.borrow().pending
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<FetchState<T>> {
        self.inner.state.subscribe()
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Number of times this binding has invoked its fetcher.
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetch_calls.load(Ordering::Relaxed)
    }

    fn cache_config(&self) -> Option<&CacheConfig> {
        self.inner.cache.as_ref().filter(|cache| cache.enabled)
    }

    // == Network Path ==
    async fn run_fetch(&self) {
        let inner = &self.inner;
        let request = inner.next_request.fetch_add(1, Ordering::AcqRel) + 1;

        inner.in_flight.fetch_add(1, Ordering::AcqRel);
        inner.state.send_modify(|state| {
            state.pending = true;
            state.error = false;
        });

        inner.fetch_calls.fetch_add(1, Ordering::Relaxed);
        let result = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => None,
            result = (inner.fetcher)() => Some(result),
        };

        inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        let result = match result {
            Some(result) if !inner.cancel.is_cancelled() => result,
            _ => {
                debug!(request, "Fetch cancelled by teardown");
                inner.state.send_modify(|state| {
                    state.pending = inner.in_flight.load(Ordering::Acquire) > 0;
                });
                return;
            }
        };

        let previous = inner.last_applied.fetch_max(request, Ordering::AcqRel);
        let stale = previous > request;

        match result {
            Ok(response) if !stale => {
                if let (Some(cache), Some(data)) = (self.cache_config(), response.data.as_ref()) {
                    inner.store.set(cache.id.clone(), data, cache.ttl);
                }
                inner.state.send_modify(|state| {
                    state.data = response.data;
                    state.pending = inner.in_flight.load(Ordering::Acquire) > 0;
                });
            }
            Err(e) if !stale => {
                warn!(
                    cache = ?self.cache_config().map(|c| &c.id),
                    error = %e,
                    "Fetch failed, keeping previous data"
                );
                inner.state.send_modify(|state| {
                    state.error = true;
                    state.pending = inner.in_flight.load(Ordering::Acquire) > 0;
                });
            }
            _ => {
                debug!(request, newer = previous, "Discarding stale fetch result");
                inner.state.send_modify(|state| {
                    state.pending = inner.in_flight.load(Ordering::Acquire) > 0;
                });
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use std::sync::Mutex;

    fn store() -> CacheStore {
        CacheStore::new(CacheOptions::default())
    }

    /// Fetcher returning `value` and counting its calls.
    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl Fn() -> FetchFuture<String> + Send + Sync + 'static {
        move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(FetchResponse::new(Some(value.to_string())))
            }
            .boxed()
        }
    }

    fn cached(id: &str) -> FetchOptions<String> {
        FetchOptions {
            cache: Some(CacheConfig::new(id)),
            ..FetchOptions::default()
        }
    }

    #[test]
    fn test_debug_reports_flags() {
        let binding = FetchBinding::<String>::new(
            store(),
            FetchOptions {
                disabled: true,
                ..cached("city:7")
            },
            || async { Ok(FetchResponse::new(None)) },
        );
        binding.close();

        let rendered = format!("{binding:?}");
        assert!(rendered.contains("disabled: true"));
        assert!(rendered.contains("closed: true"));
        assert!(rendered.contains("city:7"));
    }

    #[tokio::test]
    async fn test_activate_fetches_and_caches() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));

        let binding = FetchBinding::mount(
            store.clone(),
            cached("project:1"),
            counting_fetcher(calls.clone(), "summer"),
        )
        .await;

        assert_eq!(
            binding.state(),
            FetchState {
                data: Some("summer".to_string()),
                error: false,
                pending: false,
            }
        );
        assert_eq!(store.get::<String>("project:1").as_deref(), Some("summer"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_network() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = FetchBinding::mount(
            store.clone(),
            cached("project:2"),
            counting_fetcher(calls.clone(), "autumn"),
        )
        .await;
        let second = FetchBinding::mount(
            store.clone(),
            cached("project:2"),
            counting_fetcher(calls.clone(), "autumn"),
        )
        .await;
        first.activate().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.data().as_deref(), Some("autumn"));
        assert_eq!(second.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_leaves_pending_and_error_untouched() {
        let store = store();
        store.set("city:1", &"Kazan", None);

        let binding = FetchBinding::new(store.clone(), cached("city:1"), || async {
            anyhow::bail!("must not be called")
        });
        binding.activate().await;

        let state = binding.state();
        assert_eq!(state.data.as_deref(), Some("Kazan"));
        assert!(!state.pending);
        assert!(!state.error);
        assert_eq!(binding.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_ttl_override() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = FetchOptions {
            cache: Some(CacheConfig::new("events:3").with_ttl(Duration::from_secs(1))),
            ..FetchOptions::default()
        };

        let binding = FetchBinding::new(store.clone(), options, counting_fetcher(calls.clone(), "x"));
        binding.activate().await;
        tokio::time::advance(Duration::from_millis(1500)).await;
        binding.activate().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_always_fetches() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = FetchOptions {
            cache: Some(CacheConfig {
                enabled: false,
                id: "events:all".to_string(),
                ttl: None,
            }),
            ..FetchOptions::default()
        };

        let binding = FetchBinding::new(store.clone(), options, counting_fetcher(calls.clone(), "x"));
        binding.activate().await;
        binding.activate().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_never_fetches_until_enabled() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = FetchOptions {
            default_value: Some("placeholder".to_string()),
            disabled: true,
            cache: Some(CacheConfig::new("event:9")),
        };

        let binding = FetchBinding::new(store.clone(), options, counting_fetcher(calls.clone(), "live"));
        binding.activate().await;
        binding.refresh().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(binding.data().as_deref(), Some("placeholder"));
        assert!(!binding.pending());

        binding.set_disabled(false).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(binding.data().as_deref(), Some("live"));
    }

    #[tokio::test]
    async fn test_error_keeps_previous_data() {
        let store = store();
        let fail = Arc::new(AtomicBool::new(false));

        let flag = fail.clone();
        let binding = FetchBinding::new(store.clone(), cached("track:3"), move || {
            let fail = flag.load(Ordering::SeqCst);
            async move {
                if fail {
                    anyhow::bail!("network unreachable");
                }
                Ok(FetchResponse::new(Some("intro".to_string())))
            }
        });
        binding.activate().await;
        assert_eq!(binding.data().as_deref(), Some("intro"));

        fail.store(true, Ordering::SeqCst);
        binding.refresh().await;

        let state = binding.state();
        assert!(state.error);
        assert!(!state.pending);
        assert_eq!(state.data.as_deref(), Some("intro"));

        // A later success clears the flag
        fail.store(false, Ordering::SeqCst);
        binding.refresh().await;
        assert!(!binding.error());
    }

    #[tokio::test]
    async fn test_null_result_is_not_cached() {
        let store = store();
        let binding = FetchBinding::<String>::mount(
            store.clone(),
            FetchOptions {
                default_value: Some("stale".to_string()),
                ..cached("location:404")
            },
            || async { Ok(FetchResponse::new(None)) },
        )
        .await;

        assert_eq!(binding.data(), None);
        assert!(!store.contains_key("location:404"));
    }

    #[tokio::test]
    async fn test_refresh_does_not_notify_subscribers() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let notified = Arc::new(Mutex::new(Vec::new()));

        let sink = notified.clone();
        let _sub = store.subscribe(move |key| sink.lock().unwrap().push(key.to_string()));

        let binding = FetchBinding::mount(
            store.clone(),
            cached("project:5"),
            counting_fetcher(calls.clone(), "v1"),
        )
        .await;
        binding.refresh().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2, "refresh bypasses the cache hit");
        assert!(notified.lock().unwrap().is_empty());

        store.delete("project:5");
        assert_eq!(*notified.lock().unwrap(), vec!["project:5".to_string()]);
    }

    #[tokio::test]
    async fn test_pending_while_fetch_outstanding() {
        let store = store();
        let gate = Arc::new(tokio::sync::Notify::new());

        let wait = gate.clone();
        let binding = FetchBinding::new(store, FetchOptions::default(), move || {
            let wait = wait.clone();
            async move {
                wait.notified().await;
                Ok(FetchResponse::new(Some("done".to_string())))
            }
        });

        let mut states = binding.watch();
        let task = tokio::spawn({
            let binding = binding.clone();
            async move { binding.activate().await }
        });

        states.wait_for(|s| s.pending).await.unwrap();
        assert!(binding.pending());

        gate.notify_one();
        task.await.unwrap();

        assert!(!binding.pending());
        assert_eq!(binding.data().as_deref(), Some("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let store = store();
        let call = Arc::new(AtomicUsize::new(0));

        let counter = call.clone();
        let binding = FetchBinding::new(store.clone(), cached("tracks:42"), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                // First request is slow, second is fast
                if n == 0 {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(FetchResponse::new(Some("old".to_string())))
                } else {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(FetchResponse::new(Some("new".to_string())))
                }
            }
        });

        tokio::join!(binding.refresh(), binding.refresh());

        assert_eq!(binding.data().as_deref(), Some("new"));
        assert_eq!(store.get::<String>("tracks:42").as_deref(), Some("new"));
        assert!(!binding.pending());
    }

    #[tokio::test]
    async fn test_close_cancels_in_flight_fetch() {
        let store = store();
        let binding = FetchBinding::new(store.clone(), cached("city:all"), || async {
            std::future::pending::<()>().await;
            Ok(FetchResponse::new(Some("never".to_string())))
        });

        let mut states = binding.watch();
        let task = tokio::spawn({
            let binding = binding.clone();
            async move { binding.refresh().await }
        });
        states.wait_for(|s| s.pending).await.unwrap();

        binding.close();
        task.await.unwrap();

        assert!(binding.is_closed());
        assert!(!binding.pending(), "Cancelled fetch must not leave pending set");
        assert_eq!(binding.data(), None);
        assert!(!store.contains_key("city:all"));

        // Closed bindings ignore further triggers
        binding.refresh().await;
        assert_eq!(binding.fetch_count(), 1);
    }
}
