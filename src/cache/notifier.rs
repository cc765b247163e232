//! Invalidation Notifier Module
//!
//! Subscriber registry used by the cache store to announce deleted and
//! invalidated keys.
//!
//! # Delivery rules
//! - Each subscriber is invoked independently; a panicking callback is caught,
//!   logged and counted, and the remaining subscribers still run.
//! - Nested dispatch is suppressed: while a thread is delivering
//!   notifications, any further notification raised on that same thread (for
//!   example a subscriber that deletes another key) is dropped, not queued.
//!   The deletion itself still happens. Subscribers must not assume their own
//!   cache mutations notify other subscribers.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, error};

use super::lock::{mutex_lock, rw_read, rw_write};

/// Callback invoked with the key that was invalidated.
pub type Subscriber = Arc<dyn Fn(&str) + Send + Sync>;

// == Notify Outcome ==
/// What happened to a single `notify` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Callbacks were invoked for every key.
    Delivered,
    /// The call was nested inside another dispatch and was dropped.
    Suppressed,
}

// == Notifier ==
#[derive(Default)]
pub struct Notifier {
    subscribers: RwLock<Vec<(u64, Subscriber)>>,
    next_id: AtomicU64,
    /// Threads currently inside `notify`
    dispatching: Mutex<HashSet<ThreadId>>,
    delivered: AtomicU64,
    suppressed: AtomicU64,
    failures: AtomicU64,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    // == Subscribe ==
    /// Registers a callback and returns the handle that deregisters it.
    pub fn subscribe(self: &Arc<Self>, callback: Subscriber) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        rw_write(&self.subscribers, "notifier.subscribe").push((id, callback));
        debug!(subscription_id = id, "Subscriber registered");

        Subscription {
            id,
            notifier: Arc::downgrade(self),
            active: AtomicBool::new(true),
        }
    }

    fn remove(&self, id: u64) {
        rw_write(&self.subscribers, "notifier.unsubscribe").retain(|(sid, _)| *sid != id);
        debug!(subscription_id = id, "Subscriber removed");
    }

    // == Notify ==
    /// Delivers each key to every subscriber registered at call time.
    pub fn notify(&self, keys: &[String]) -> NotifyOutcome {
        let Some(_guard) = DispatchGuard::enter(self) else {
            self.suppressed
                .fetch_add(keys.len() as u64, Ordering::Relaxed);
            debug!(keys = ?keys, "Nested notification suppressed");
            return NotifyOutcome::Suppressed;
        };

        // Snapshot so callbacks may subscribe or unsubscribe without deadlock
        let subscribers: Vec<(u64, Subscriber)> =
            rw_read(&self.subscribers, "notifier.notify").clone();

        for key in keys {
            for (id, callback) in &subscribers {
                let result = catch_unwind(AssertUnwindSafe(|| callback(key)));
                self.delivered.fetch_add(1, Ordering::Relaxed);
                if let Err(payload) = result {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        subscription_id = *id,
                        key = %key,
                        panic = panic_message(payload.as_ref()),
                        "Cache subscriber panicked"
                    );
                }
            }
        }

        NotifyOutcome::Delivered
    }

    pub fn subscriber_count(&self) -> usize {
        rw_read(&self.subscribers, "notifier.count").len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

// == Dispatch Guard ==
/// Marks the current thread as dispatching; released on drop, even if a
/// panic escapes.
struct DispatchGuard<'a> {
    notifier: &'a Notifier,
    thread: ThreadId,
}

impl<'a> DispatchGuard<'a> {
    fn enter(notifier: &'a Notifier) -> Option<Self> {
        let thread = thread::current().id();
        let fresh = mutex_lock(&notifier.dispatching, "notifier.enter").insert(thread);
        fresh.then_some(Self { notifier, thread })
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        mutex_lock(&self.notifier.dispatching, "notifier.exit").remove(&self.thread);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

// == Subscription ==
/// Handle returned by `subscribe`.
///
/// Unsubscribing is idempotent, and dropping the handle unsubscribes, which
/// ties a subscription to the lifetime of its owner.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    id: u64,
    notifier: Weak<Notifier>,
    active: AtomicBool,
}

impl Subscription {
    /// Deregisters the callback. Calls after the first are no-ops.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            if let Some(notifier) = self.notifier.upgrade() {
                notifier.remove(self.id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
