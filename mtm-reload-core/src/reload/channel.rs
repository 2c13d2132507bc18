//! Dev-server notifications.
//!
//! After a task commits, the orchestrator tells the dev server which module
//! changed and broadcasts custom events for the client runtime.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

/// Custom event carrying the hot-reload payload.
pub const HOT_RELOAD_EVENT: &str = "mtm:hot-reload";

/// A module-level update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdate {
    pub path: String,
    pub accepted_path: String,
    pub timestamp: u64,
}

/// Payload of [`HOT_RELOAD_EVENT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotReloadPayload {
    pub file: String,
    pub timestamp: u64,
    pub preserve_state: bool,
    pub modules: Vec<String>,
}

/// Outbound channel to the dev server.
pub trait DevServerChannel: Send + Sync {
    fn send_update(&self, update: &ModuleUpdate);

    fn send_custom(&self, event: &str, payload: &Value);
}

/// Drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullChannel;

impl DevServerChannel for NullChannel {
    fn send_update(&self, _update: &ModuleUpdate) {}

    fn send_custom(&self, _event: &str, _payload: &Value) {}
}

/// A message recorded by [`MemoryChannel`].
#[derive(Debug, Clone, PartialEq)]
pub enum DevServerMessage {
    Update(ModuleUpdate),
    Custom { event: String, payload: Value },
}

/// Keeps every message in memory, in send order.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    messages: Mutex<Vec<DevServerMessage>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<DevServerMessage> {
        self.messages.lock().clone()
    }

    /// Payloads of custom events named `event`.
    pub fn custom(&self, event: &str) -> Vec<Value> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| match m {
                DevServerMessage::Custom { event: e, payload } if e == event => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<ModuleUpdate> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| match m {
                DevServerMessage::Update(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl DevServerChannel for MemoryChannel {
    fn send_update(&self, update: &ModuleUpdate) {
        self.messages.lock().push(DevServerMessage::Update(update.clone()));
    }

    fn send_custom(&self, event: &str, payload: &Value) {
        self.messages.lock().push(DevServerMessage::Custom {
            event: event.to_string(),
            payload: payload.clone(),
        });
    }
}
