//! Cache-Subscription Binding
//!
//! Lets a consumer declare the key patterns it cares about and get called back
//! when a matching key is invalidated anywhere in the process.
//!
//! Matching uses [`matches_subscription_key`], the cheap prefix test, not the
//! glob engine behind `CacheStore::invalidate`.

use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::binding::{Fetchable, FetchBinding};
use crate::cache::lock::{rw_read, rw_write};
use crate::cache::{matches_subscription_key, CacheStore, Subscription};

type InvalidateCallback = Arc<dyn Fn(&str) + Send + Sync>;

// == Cache Subscription ==
/// Subscribed for as long as the value lives, or until [`close`](Self::close).
#[must_use = "dropping a CacheSubscription unsubscribes it"]
pub struct CacheSubscription {
    keys: Arc<Vec<String>>,
    callback: Arc<RwLock<InvalidateCallback>>,
    subscription: Subscription,
}

impl fmt::Debug for CacheSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSubscription")
            .field("keys", &self.keys)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

impl CacheSubscription {
    /// Subscribes once to `store`. `on_invalidate` runs at most once per
    /// invalidated key, when any of `keys` matches it.
    pub fn new<I, K>(
        store: &CacheStore,
        keys: I,
        on_invalidate: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Arc<Vec<String>> = Arc::new(keys.into_iter().map(Into::into).collect());
        let initial: InvalidateCallback = Arc::new(on_invalidate);
        let callback = Arc::new(RwLock::new(initial));

        let patterns = keys.clone();
        let cell = callback.clone();
        let subscription = store.subscribe(move |key| {
            if !patterns.iter().any(|pattern| matches_subscription_key(key, pattern)) {
                return;
            }
            // Clone out of the cell so the callback may replace itself
            let current = rw_read(&cell, "subscription.dispatch").clone();
            current(key);
        });

        debug!(keys = ?keys, "Cache subscription registered");
        Self {
            keys,
            callback,
            subscription,
        }
    }

    /// Swaps in a newer callback without re-subscribing.
    pub fn set_callback(&self, on_invalidate: impl Fn(&str) + Send + Sync + 'static) {
        let next: InvalidateCallback = Arc::new(on_invalidate);
        *rw_write(&self.callback, "subscription.set_callback") = next;
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    /// Unsubscribes now; dropping does the same.
    pub fn close(&self) {
        self.subscription.unsubscribe();
    }
}

// == Refresh On Invalidate ==
/// Silently refreshes `binding` whenever a key matching `keys` is invalidated.
///
/// The refresh is spawned on the runtime current at call time. Refreshes write
/// with `CacheStore::set`, so they never trigger further notifications.
pub fn refresh_on_invalidate<T, I, K>(
    store: &CacheStore,
    binding: &FetchBinding<T>,
    keys: I,
) -> CacheSubscription
where
    T: Fetchable,
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    let handle = Handle::try_current().ok();
    if handle.is_none() {
        warn!("No tokio runtime; invalidations will not refresh this binding");
    }

    let binding = binding.clone();
    CacheSubscription::new(store, keys, move |key| {
        let Some(handle) = handle.as_ref() else {
            return;
        };
        debug!(key = %key, "Refreshing binding after invalidation");
        let binding = binding.clone();
        handle.spawn(async move { binding.refresh().await });
    })
}
