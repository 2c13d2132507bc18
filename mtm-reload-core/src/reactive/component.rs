//! Framework islands.
//!
//! An island is one mounted component instance belonging to one UI framework.
//! The core only ever sees it as a [`ComponentRef`] plus an opaque handle;
//! framework-specific collaborators are the only code that looks inside.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// UI frameworks that can host an island.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    React,
    Vue,
    Svelte,
    Solid,
    Native,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::React => "react",
            Framework::Vue => "vue",
            Framework::Svelte => "svelte",
            Framework::Solid => "solid",
            Framework::Native => "native",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized framework name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown framework `{0}`")]
pub struct UnknownFramework(pub String);

impl FromStr for Framework {
    type Err = UnknownFramework;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "react" | "reactjs" => Ok(Framework::React),
            "vue" | "vuejs" => Ok(Framework::Vue),
            "svelte" | "sveltejs" => Ok(Framework::Svelte),
            "solid" | "solidjs" => Ok(Framework::Solid),
            "native" | "vanilla" | "html" => Ok(Framework::Native),
            _ => Err(UnknownFramework(s.to_string())),
        }
    }
}

/// Lookup key for a mounted island.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    pub framework: Framework,
    pub component_id: String,
}

impl ComponentRef {
    pub fn new(framework: Framework, component_id: impl Into<String>) -> Self {
        Self {
            framework,
            component_id: component_id.into(),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.framework, self.component_id)
    }
}

/// Opaque framework-specific handle (React element, Vue instance, ...).
#[derive(Clone)]
pub struct IslandHandle(Arc<dyn Any + Send + Sync>);

impl IslandHandle {
    pub fn new<T: Any + Send + Sync>(handle: T) -> Self {
        Self(Arc::new(handle))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for IslandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IslandHandle(..)")
    }
}

/// A live island.
#[derive(Debug, Clone)]
pub struct Island {
    pub component: ComponentRef,
    /// File that defines the component, when known.
    pub source: Option<PathBuf>,
    pub handle: Option<IslandHandle>,
    /// Framework-local state preserved alongside signals.
    pub local_state: Option<Value>,
}

impl Island {
    pub fn new(component: ComponentRef) -> Self {
        Self {
            component,
            source: None,
            handle: None,
            local_state: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_handle(mut self, handle: IslandHandle) -> Self {
        self.handle = Some(handle);
        self
    }
}

pub(crate) type IslandMap = IndexMap<ComponentRef, Island>;

/// Registry of live islands, in mount order.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    islands: RwLock<IslandMap>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an island. Re-registering replaces the previous entry but
    /// keeps its mount position.
    pub fn register(&self, island: Island) -> bool {
        let key = island.component.clone();
        self.islands.write().insert(key, island).is_none()
    }

    pub fn unregister(&self, component: &ComponentRef) -> Option<Island> {
        self.islands.write().shift_remove(component)
    }

    pub fn contains(&self, component: &ComponentRef) -> bool {
        self.islands.read().contains_key(component)
    }

    pub fn get(&self, component: &ComponentRef) -> Option<Island> {
        self.islands.read().get(component).cloned()
    }

    /// Live components in mount order.
    pub fn connections(&self) -> Vec<ComponentRef> {
        self.islands.read().keys().cloned().collect()
    }

    /// Islands defined by a given source file.
    pub fn from_source(&self, source: &Path) -> Vec<ComponentRef> {
        self.islands
            .read()
            .values()
            .filter(|i| i.source.as_deref() == Some(source))
            .map(|i| i.component.clone())
            .collect()
    }

    pub fn set_local_state(&self, component: &ComponentRef, state: Value) -> bool {
        match self.islands.write().get_mut(component) {
            Some(island) => {
                island.local_state = Some(state);
                true
            }
            None => false,
        }
    }

    pub fn local_state(&self, component: &ComponentRef) -> Option<Value> {
        self.islands
            .read()
            .get(component)
            .and_then(|i| i.local_state.clone())
    }

    pub fn len(&self) -> usize {
        self.islands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.islands.read().is_empty()
    }

    pub(crate) fn lock(&self) -> &RwLock<IslandMap> {
        &self.islands
    }
}
