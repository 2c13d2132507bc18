//! Cross-framework snapshots.
//!
//! A snapshot is an immutable copy of signal values, subscriptions and live
//! island connections taken strictly before a reload. It is consumed by value
//! when restored, so the same snapshot can never be applied twice.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::unix_millis;
use crate::error::ReloadError;
use crate::reactive::{Callback, ComponentRef, SubscriberId};

/// Identifier of a snapshot, increasing in capture order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotId(u64);

impl SnapshotId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snap-{}", self.0)
    }
}

/// A subscription as captured in a snapshot.
///
/// The callback is the live handle and cannot be serialized; a snapshot
/// decoded from bytes carries owners only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub id: SubscriberId,
    pub owner: ComponentRef,
    #[serde(skip)]
    pub callback: Option<Callback>,
}

impl SubscriptionRecord {
    pub fn new(id: SubscriberId, owner: ComponentRef, callback: Callback) -> Self {
        Self {
            id,
            owner,
            callback: Some(callback),
        }
    }
}

/// Framework-local state captured for one island.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentState {
    pub component: ComponentRef,
    pub state: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossFrameworkSnapshot {
    id: SnapshotId,
    signal_values: IndexMap<String, Value>,
    subscriptions: IndexMap<String, Vec<SubscriptionRecord>>,
    connections: Vec<ComponentRef>,
    #[serde(default)]
    component_states: Vec<ComponentState>,
    timestamp: u64,
}

impl CrossFrameworkSnapshot {
    /// Assemble a snapshot from parts.
    ///
    /// No validation happens here; [`validate`](Self::validate) runs when the
    /// snapshot is restored.
    pub fn from_parts(
        signal_values: IndexMap<String, Value>,
        subscriptions: IndexMap<String, Vec<SubscriptionRecord>>,
        connections: Vec<ComponentRef>,
    ) -> Self {
        Self {
            id: SnapshotId::next(),
            signal_values,
            subscriptions,
            connections,
            component_states: Vec::new(),
            timestamp: unix_millis(),
        }
    }

    pub fn with_component_states(mut self, states: Vec<ComponentState>) -> Self {
        self.component_states = states;
        self
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn signal_values(&self) -> &IndexMap<String, Value> {
        &self.signal_values
    }

    pub fn subscriptions(&self) -> &IndexMap<String, Vec<SubscriptionRecord>> {
        &self.subscriptions
    }

    /// Owner IDs per event, in delivery order.
    pub fn subscription_owners(&self) -> IndexMap<&str, Vec<&str>> {
        self.subscriptions
            .iter()
            .map(|(event, records)| {
                (
                    event.as_str(),
                    records.iter().map(|r| r.owner.component_id.as_str()).collect(),
                )
            })
            .collect()
    }

    pub fn subscription_count(&self, event: &str) -> usize {
        self.subscriptions.get(event).map_or(0, Vec::len)
    }

    pub fn connections(&self) -> &[ComponentRef] {
        &self.connections
    }

    pub fn component_states(&self) -> &[ComponentState] {
        &self.component_states
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        IndexMap<String, Value>,
        IndexMap<String, Vec<SubscriptionRecord>>,
        Vec<ComponentRef>,
        Vec<ComponentState>,
    ) {
        (
            self.signal_values,
            self.subscriptions,
            self.connections,
            self.component_states,
        )
    }

    /// Check the snapshot for structural malformation.
    pub fn validate(&self) -> Result<(), ReloadError> {
        if let Some(key) = self.signal_values.keys().find(|k| k.trim().is_empty()) {
            return Err(malformed(format!("empty signal key {key:?}")));
        }

        for (event, records) in &self.subscriptions {
            if event.trim().is_empty() {
                return Err(malformed("subscription map has an empty event name"));
            }
            let mut seen = HashSet::with_capacity(records.len());
            for record in records {
                if record.owner.component_id.trim().is_empty() {
                    return Err(malformed(format!(
                        "subscription {} on `{event}` has no owner",
                        record.id
                    )));
                }
                if !seen.insert(record.id) {
                    return Err(malformed(format!(
                        "subscription {} appears twice on `{event}`",
                        record.id
                    )));
                }
            }
        }

        if self.connections.iter().any(|c| c.component_id.trim().is_empty()) {
            return Err(malformed("connection with an empty component id"));
        }

        if !self.component_states.is_empty() {
            let connected: HashSet<_> = self.connections.iter().collect();
            if let Some(orphan) = self
                .component_states
                .iter()
                .find(|s| !connected.contains(&s.component))
            {
                return Err(malformed(format!(
                    "component state for {} which is not a captured connection",
                    orphan.component
                )));
            }
        }

        Ok(())
    }

    /// Encode as MessagePack. Callbacks are not included.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, ReloadError> {
        rmp_serde::to_vec_named(self).map_err(|e| malformed(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, ReloadError> {
        rmp_serde::from_slice(bytes).map_err(|e| malformed(e.to_string()))
    }
}

fn malformed(detail: impl Into<String>) -> ReloadError {
    ReloadError::StructuralSnapshot(detail.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Framework;
    use serde_json::json;

    fn owner(id: &str) -> ComponentRef {
        ComponentRef::new(Framework::React, id)
    }

    fn sample() -> CrossFrameworkSnapshot {
        let mut values = IndexMap::new();
        values.insert("counter".to_string(), json!(5));

        let mut subs = IndexMap::new();
        subs.insert(
            "message-sent".to_string(),
            vec![SubscriptionRecord::new(
                SubscriberId::new(),
                owner("CompA"),
                Callback::new(|_| {}),
            )],
        );

        CrossFrameworkSnapshot::from_parts(values, subs, vec![owner("CompA")])
    }

    #[test]
    fn ids_increase() {
        let a = sample();
        let b = sample();
        assert!(b.id() > a.id());
    }

    #[test]
    fn valid_snapshot_passes() {
        let snapshot = sample();
        assert!(snapshot.validate().is_ok());
        assert_eq!(snapshot.subscription_count("message-sent"), 1);
        assert_eq!(
            snapshot.subscription_owners().get("message-sent"),
            Some(&vec!["CompA"])
        );
    }

    #[test]
    fn detects_empty_key() {
        let mut values = IndexMap::new();
        values.insert("  ".to_string(), json!(1));
        let snapshot = CrossFrameworkSnapshot::from_parts(values, IndexMap::new(), Vec::new());
        assert!(matches!(
            snapshot.validate(),
            Err(ReloadError::StructuralSnapshot(_))
        ));
    }

    #[test]
    fn detects_duplicate_subscription() {
        let id = SubscriberId::new();
        let mut subs = IndexMap::new();
        subs.insert(
            "tick".to_string(),
            vec![
                SubscriptionRecord::new(id, owner("A"), Callback::new(|_| {})),
                SubscriptionRecord::new(id, owner("A"), Callback::new(|_| {})),
            ],
        );
        let snapshot = CrossFrameworkSnapshot::from_parts(IndexMap::new(), subs, Vec::new());
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn detects_orphan_component_state() {
        let orphan = vec![ComponentState {
            component: owner("Ghost"),
            state: json!({}),
        }];
        let snapshot =
            CrossFrameworkSnapshot::from_parts(IndexMap::new(), IndexMap::new(), Vec::new())
                .with_component_states(orphan);
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn msgpack_drops_callbacks_but_keeps_owners() {
        let snapshot = sample();
        let bytes = snapshot.to_msgpack().unwrap();
        let decoded = CrossFrameworkSnapshot::from_msgpack(&bytes).unwrap();

        assert_eq!(decoded.id(), snapshot.id());
        assert_eq!(decoded.signal_values(), snapshot.signal_values());
        assert_eq!(decoded.connections(), snapshot.connections());
        let records = &decoded.subscriptions()["message-sent"];
        assert_eq!(records[0].owner, owner("CompA"));
        assert!(records[0].callback.is_none());
    }

    #[test]
    fn garbage_bytes_are_structural_errors() {
        assert!(matches!(
            CrossFrameworkSnapshot::from_msgpack(&[0xc1, 0x00]),
            Err(ReloadError::StructuralSnapshot(_))
        ));
    }
}
