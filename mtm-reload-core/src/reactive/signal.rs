//! Signal Store
//!
//! A Signal is a keyed reactive value shared by every framework island on the
//! page. The store owns exactly one live [`Signal`] per key.
//!
//! # How the Store Works
//!
//! 1. `set` creates the key on first write and replaces the value afterwards,
//!    bumping the signal's version.
//!
//! 2. Watchers registered with `watch` are told about every change, after the
//!    store lock has been released.
//!
//! 3. Batch writes (used by restore) apply under a single write lock, so a
//!    concurrent reader sees either every value of the batch or none of them.
//!
//! # Thread Safety
//!
//! The map is guarded by a `parking_lot::RwLock`. Reads clone the value out,
//! so no guard is ever held across a watcher call.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SubscriberId;

/// A uniquely keyed reactive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    key: String,
    value: Value,
    /// Incremented on every update that changes the value.
    version: u64,
}

impl Signal {
    fn new(key: String, value: Value) -> Self {
        Self {
            key,
            value,
            version: 0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the value. Returns false if the value was already equal.
    fn replace(&mut self, value: Value) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.version += 1;
        true
    }
}

type Watcher = Arc<dyn Fn(&str, &Value) + Send + Sync>;

pub(crate) type SignalMap = IndexMap<String, Signal>;

/// Process-wide keyed value store.
#[derive(Default)]
pub struct SignalStore {
    signals: RwLock<SignalMap>,
    watchers: RwLock<Vec<(SubscriberId, Watcher)>>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the current value for `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.signals.read().get(key).map(|s| s.value.clone())
    }

    /// Get the full signal record (value and version).
    pub fn signal(&self, key: &str) -> Option<Signal> {
        self.signals.read().get(key).cloned()
    }

    pub fn version(&self, key: &str) -> Option<u64> {
        self.signals.read().get(key).map(|s| s.version)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.signals.read().contains_key(key)
    }

    /// Set a value, creating the signal if it does not exist.
    ///
    /// Returns the signal's version after the write.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> u64 {
        let key = key.into();
        let value = value.into();

        let (version, changed) = {
            let mut signals = self.signals.write();
            match signals.get_mut(&key) {
                Some(signal) => {
                    let changed = signal.replace(value.clone());
                    (signal.version, changed)
                }
                None => {
                    signals.insert(key.clone(), Signal::new(key.clone(), value.clone()));
                    (0, true)
                }
            }
        };

        if changed {
            self.notify(&[(key, value)]);
        }
        version
    }

    /// Update a value using a function of the current value.
    ///
    /// Returns `None` if the key does not exist.
    pub fn update<F>(&self, key: &str, f: F) -> Option<u64>
    where
        F: FnOnce(&Value) -> Value,
    {
        let (version, new_value) = {
            let mut signals = self.signals.write();
            let signal = signals.get_mut(key)?;
            let new_value = f(&signal.value);
            if !signal.replace(new_value.clone()) {
                return Some(signal.version);
            }
            (signal.version, new_value)
        };

        self.notify(&[(key.to_string(), new_value)]);
        Some(version)
    }

    /// Remove a signal. Returns its last value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.signals.write().shift_remove(key).map(|s| s.value)
    }

    /// Keys in creation order.
    pub fn keys(&self) -> Vec<String> {
        self.signals.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.signals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.read().is_empty()
    }

    /// Copy every value out under a single read lock.
    pub fn values(&self) -> IndexMap<String, Value> {
        values_of(&self.signals.read())
    }

    /// Register a watcher invoked with `(key, value)` after each change.
    pub fn watch<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.watchers.write().push((id, Arc::new(f)));
        id
    }

    /// Remove a watcher.
    pub fn unwatch(&self, id: SubscriberId) -> bool {
        let mut watchers = self.watchers.write();
        let before = watchers.len();
        watchers.retain(|(w, _)| *w != id);
        watchers.len() != before
    }

    pub(crate) fn lock(&self) -> &RwLock<SignalMap> {
        &self.signals
    }

    /// Tell watchers about changed keys. Must be called without the map lock.
    pub(crate) fn notify(&self, changed: &[(String, Value)]) {
        if changed.is_empty() {
            return;
        }
        let watchers: Vec<Watcher> = self
            .watchers
            .read()
            .iter()
            .map(|(_, w)| Arc::clone(w))
            .collect();

        for (key, value) in changed {
            for watcher in &watchers {
                watcher(key, value);
            }
        }
    }
}

impl fmt::Debug for SignalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalStore")
            .field("signals", &self.len())
            .field("watchers", &self.watchers.read().len())
            .finish()
    }
}

pub(crate) fn values_of(signals: &SignalMap) -> IndexMap<String, Value> {
    signals
        .iter()
        .map(|(k, s)| (k.clone(), s.value.clone()))
        .collect()
}

/// Write a batch of values into a locked map, creating missing keys.
///
/// Returns the entries that actually changed, for watcher notification once
/// the lock is released.
pub(crate) fn apply_values(
    signals: &mut SignalMap,
    values: &IndexMap<String, Value>,
) -> Vec<(String, Value)> {
    let mut changed = Vec::new();
    for (key, value) in values {
        match signals.get_mut(key) {
            Some(signal) => {
                if signal.replace(value.clone()) {
                    changed.push((key.clone(), value.clone()));
                }
            }
            None => {
                signals.insert(key.clone(), Signal::new(key.clone(), value.clone()));
                changed.push((key.clone(), value.clone()));
            }
        }
    }
    changed
}
