//! Subscriber types for the pub/sub bus and signal watchers.
//!
//! A subscriber is an opaque callback plus a stable identity. The identity is
//! what survives a snapshot/restore cycle; the callback is carried along by
//! reference and never inspected.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for a subscriber.
///
/// Each subscription (or signal watcher) gets a unique ID when created. This
/// ID is used to recognise a subscription that is already live so a restore
/// never registers it twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for SubscriberId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An opaque event callback.
///
/// Cloning shares the underlying closure, so a callback held by a snapshot is
/// the very same handle the component registered.
#[derive(Clone)]
pub struct Callback {
    notify: Arc<dyn Fn(&Value) + Send + Sync>,
}

impl Callback {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self {
            notify: Arc::new(notify),
        }
    }

    /// Invoke the callback with an event payload.
    pub fn call(&self, payload: &Value) {
        (self.notify)(payload);
    }

    /// Whether two callbacks share the same closure.
    pub fn same_as(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.notify, &other.notify)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("refs", &Arc::strong_count(&self.notify))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn callback_receives_payload() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = Callback::new(move |payload| {
            if payload == &Value::from("hello") {
                called_clone.store(true, Ordering::SeqCst);
            }
        });

        assert!(!called.load(Ordering::SeqCst));
        callback.call(&Value::from("hello"));
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn cloned_callback_is_same_handle() {
        let a = Callback::new(|_| {});
        let b = a.clone();
        let c = Callback::new(|_| {});

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }
}
