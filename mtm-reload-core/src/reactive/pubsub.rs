//! Subscription Registry
//!
//! Maps an event name to the ordered list of callbacks subscribed to it.
//! Registration order is delivery order, and that order is what a
//! snapshot/restore cycle has to reproduce, so each event holds a `Vec`
//! rather than any hashed set.

use std::fmt;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use super::{Callback, ComponentRef, SubscriberId};

/// One subscription on the bus.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriberId,
    pub event: String,
    pub owner: ComponentRef,
    pub callback: Callback,
}

pub(crate) type EventMap = IndexMap<String, Vec<Subscription>>;

/// Process-wide event name → ordered subscribers.
#[derive(Default)]
pub struct SubscriptionRegistry {
    events: RwLock<EventMap>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to `event` on behalf of `owner`.
    pub fn subscribe<F>(
        &self,
        event: impl Into<String>,
        owner: ComponentRef,
        callback: F,
    ) -> SubscriberId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe_callback(event, owner, Callback::new(callback))
    }

    /// Subscribe an existing callback handle.
    pub fn subscribe_callback(
        &self,
        event: impl Into<String>,
        owner: ComponentRef,
        callback: Callback,
    ) -> SubscriberId {
        let event = event.into();
        let id = SubscriberId::new();
        trace!(event = %event, owner = %owner, %id, "subscribe");
        self.events
            .write()
            .entry(event.clone())
            .or_default()
            .push(Subscription {
                id,
                event,
                owner,
                callback,
            });
        id
    }

    /// Remove a single subscription.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut events = self.events.write();
        let mut removed = false;
        for subs in events.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
        }
        events.retain(|_, subs| !subs.is_empty());
        removed
    }

    /// Remove every subscription owned by `owner`. Returns how many went.
    pub fn unsubscribe_owner(&self, owner: &ComponentRef) -> usize {
        let mut events = self.events.write();
        let removed = remove_owned(&mut events, owner, None);
        events.retain(|_, subs| !subs.is_empty());
        removed
    }

    /// Remove `owner`'s subscriptions to the given events only.
    pub fn unsubscribe_owner_from(&self, owner: &ComponentRef, event_names: &[String]) -> usize {
        let mut events = self.events.write();
        let removed = remove_owned(&mut events, owner, Some(event_names));
        events.retain(|_, subs| !subs.is_empty());
        removed
    }

    /// Deliver `payload` to every subscriber of `event`, in registration
    /// order. Callbacks run outside the registry lock.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let callbacks: Vec<Callback> = match self.events.read().get(event) {
            Some(subs) => subs.iter().map(|s| s.callback.clone()).collect(),
            None => return 0,
        };
        for callback in &callbacks {
            callback.call(payload);
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.events.read().get(event).map_or(0, Vec::len)
    }

    /// Subscriber IDs for `event` in delivery order.
    pub fn subscribers(&self, event: &str) -> Vec<SubscriberId> {
        self.events
            .read()
            .get(event)
            .map(|subs| subs.iter().map(|s| s.id).collect())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.read().keys().cloned().collect()
    }

    pub fn total(&self) -> usize {
        self.events.read().values().map(Vec::len).sum()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    pub(crate) fn lock(&self) -> &RwLock<EventMap> {
        &self.events
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events = self.events.read();
        f.debug_struct("SubscriptionRegistry")
            .field("events", &events.len())
            .field("subscriptions", &events.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

fn remove_owned(
    events: &mut EventMap,
    owner: &ComponentRef,
    only: Option<&[String]>,
) -> usize {
    let mut removed = 0;
    for (name, subs) in events.iter_mut() {
        if let Some(only) = only {
            if !only.iter().any(|e| e == name) {
                continue;
            }
        }
        let before = subs.len();
        subs.retain(|s| &s.owner != owner);
        removed += before - subs.len();
    }
    removed
}

/// Hand `from`'s subscriptions to `to` without changing their position.
pub(crate) fn transfer_owned(
    events: &mut EventMap,
    from: &ComponentRef,
    to: &ComponentRef,
) -> usize {
    let mut moved = 0;
    for sub in events.values_mut().flatten().filter(|s| &s.owner == from) {
        sub.owner = to.clone();
        moved += 1;
    }
    moved
}
