//! Reactive Runtime
//!
//! The runtime is the context object that ties the signal store, the
//! subscription bus and the island registry together. It is passed by handle
//! into the synchronizer and the orchestrator, so every test can build an
//! isolated one.
//!
//! # Lock Order
//!
//! Operations that touch more than one part of the runtime (snapshot and
//! restore) take the locks in a fixed order: signals, then subscriptions,
//! then islands. Single-part operations take only their own lock.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::component::IslandMap;
use super::pubsub::{transfer_owned, EventMap};
use super::signal::SignalMap;
use super::{
    ComponentRef, ComponentRegistry, Framework, Island, SignalStore, SubscriberId,
    SubscriptionRegistry,
};

#[derive(Default)]
struct RuntimeInner {
    signals: SignalStore,
    subscriptions: SubscriptionRegistry,
    components: ComponentRegistry,
}

/// Shared handle to one isolated reactive world.
///
/// Cloning the handle shares the underlying stores.
#[derive(Clone, Default)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> &SignalStore {
        &self.inner.signals
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.inner.subscriptions
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.inner.components
    }

    /// Register a bare island for `framework`/`component_id`.
    pub fn register_component(
        &self,
        framework: Framework,
        component_id: impl Into<String>,
    ) -> ComponentRef {
        let component = ComponentRef::new(framework, component_id);
        self.register_island(Island::new(component.clone()));
        component
    }

    /// Register a fully described island.
    pub fn register_island(&self, island: Island) -> bool {
        debug!(component = %island.component, "island mounted");
        self.inner.components.register(island)
    }

    /// Unregister an island and drop every subscription it owns.
    pub fn unregister_component(&self, component: &ComponentRef) -> bool {
        let removed = self.inner.components.unregister(component).is_some();
        if removed {
            let dropped = self.inner.subscriptions.unsubscribe_owner(component);
            debug!(%component, dropped, "island unmounted");
        }
        removed
    }

    /// Move an island to another framework, keeping its mount position and
    /// handing its subscriptions to the new owner in place.
    ///
    /// The old framework handle is dropped; the new framework's mount fills
    /// it in. Returns the new reference, or `None` if `component` is not
    /// registered.
    pub fn rehome_component(
        &self,
        component: &ComponentRef,
        framework: Framework,
    ) -> Option<ComponentRef> {
        let target = ComponentRef::new(framework, component.component_id.clone());
        if &target == component {
            return self.components().contains(component).then_some(target);
        }

        self.write_all(|_, events, islands| {
            let index = islands.get_index_of(component)?;
            let (_, mut island) = islands.shift_remove_index(index)?;
            island.component = target.clone();
            island.handle = None;
            if !islands.contains_key(&target) {
                islands.shift_insert(index, target.clone(), island);
            }
            let moved = transfer_owned(events, component, &target);
            debug!(from = %component, to = %target, moved, "island rehomed");
            Some(target)
        })
    }

    /// Mount an island for the lifetime of the returned guard.
    pub fn mount(&self, island: Island) -> MountGuard {
        let component = island.component.clone();
        self.register_island(island);
        MountGuard {
            runtime: self.clone(),
            component,
        }
    }

    /// Subscribe on behalf of a component.
    pub fn subscribe<F>(
        &self,
        event: impl Into<String>,
        owner: &ComponentRef,
        callback: F,
    ) -> SubscriberId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .subscriptions
            .subscribe(event, owner.clone(), callback)
    }

    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        self.inner.subscriptions.emit(event, payload)
    }

    /// Run `f` with read access to all three stores at once.
    pub(crate) fn read_all<R>(&self, f: impl FnOnce(&SignalMap, &EventMap, &IslandMap) -> R) -> R {
        let signals = self.inner.signals.lock().read();
        let events = self.inner.subscriptions.lock().read();
        let islands = self.inner.components.lock().read();
        f(&signals, &events, &islands)
    }

    /// Run `f` with exclusive access to all three stores at once.
    pub(crate) fn write_all<R>(
        &self,
        f: impl FnOnce(&mut SignalMap, &mut EventMap, &mut IslandMap) -> R,
    ) -> R {
        let mut signals = self.inner.signals.lock().write();
        let mut events = self.inner.subscriptions.lock().write();
        let mut islands = self.inner.components.lock().write();
        f(&mut signals, &mut events, &mut islands)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("signals", &self.inner.signals)
            .field("subscriptions", &self.inner.subscriptions)
            .field("islands", &self.inner.components.len())
            .finish()
    }
}

/// Keeps an island registered until dropped.
pub struct MountGuard {
    runtime: Runtime,
    component: ComponentRef,
}

impl MountGuard {
    pub fn component(&self) -> &ComponentRef {
        &self.component
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.runtime.unregister_component(&self.component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn runtimes_are_isolated() {
        let a = Runtime::new();
        let b = Runtime::new();

        a.signals().set("count", 1);
        assert_eq!(a.signals().get("count"), Some(json!(1)));
        assert_eq!(b.signals().get("count"), None);
    }

    #[test]
    fn clones_share_state() {
        let a = Runtime::new();
        let b = a.clone();
        b.signals().set("shared", true);
        assert_eq!(a.signals().get("shared"), Some(json!(true)));
    }

    #[test]
    fn unregister_drops_owned_subscriptions() {
        let runtime = Runtime::new();
        let chat = runtime.register_component(Framework::React, "Chat");
        let nav = runtime.register_component(Framework::Vue, "Nav");

        runtime.subscribe("message-sent", &chat, |_| {});
        runtime.subscribe("message-sent", &nav, |_| {});

        assert!(runtime.unregister_component(&chat));
        assert_eq!(runtime.subscriptions().subscriber_count("message-sent"), 1);
        assert!(!runtime.unregister_component(&chat));
    }

    #[test]
    fn mount_guard_unregisters_on_drop() {
        let runtime = Runtime::new();
        let island = Island::new(ComponentRef::new(Framework::Svelte, "Counter"));

        let guard = runtime.mount(island);
        let component = guard.component().clone();
        runtime.subscribe("tick", &component, |_| {});
        assert!(runtime.components().contains(&component));

        drop(guard);
        assert!(!runtime.components().contains(&component));
        assert_eq!(runtime.subscriptions().total(), 0);
    }

    #[test]
    fn rehome_keeps_subscriptions_and_order() {
        let runtime = Runtime::new();
        let chat = runtime.register_component(Framework::React, "Chat");
        let nav = runtime.register_component(Framework::Vue, "Nav");
        runtime.subscribe("message-sent", &chat, |_| {});
        runtime.subscribe("message-sent", &nav, |_| {});
        let ids = runtime.subscriptions().subscribers("message-sent");

        let moved = runtime.rehome_component(&chat, Framework::Vue).unwrap();
        assert_eq!(moved, ComponentRef::new(Framework::Vue, "Chat"));
        assert_eq!(runtime.components().connections(), vec![moved.clone(), nav]);
        assert_eq!(runtime.subscriptions().subscribers("message-sent"), ids);

        // The new owner now controls the subscription.
        assert!(!runtime.unregister_component(&chat));
        assert!(runtime.unregister_component(&moved));
        assert_eq!(runtime.subscriptions().subscriber_count("message-sent"), 1);
    }

    #[test]
    fn rehome_unknown_island_is_none() {
        let runtime = Runtime::new();
        let ghost = ComponentRef::new(Framework::Solid, "Ghost");
        assert!(runtime.rehome_component(&ghost, Framework::React).is_none());
    }

    #[test]
    fn read_all_sees_every_store() {
        let runtime = Runtime::new();
        let owner = runtime.register_component(Framework::Solid, "S");
        runtime.signals().set("k", 1);
        runtime.subscribe("e", &owner, |_| {});

        let (signals, events, islands) =
            runtime.read_all(|s, e, i| (s.len(), e.len(), i.len()));
        assert_eq!((signals, events, islands), (1, 1, 1));
    }
}
