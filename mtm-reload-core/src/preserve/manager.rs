//! State Preservation Manager
//!
//! Takes snapshots of the runtime before a reload and writes them back after.
//!
//! # Restore Rules
//!
//! - Signal values are written back as one batch, creating keys that no longer
//!   exist. Keys the snapshot does not mention are left alone.
//! - For each captured event, the snapshot is authoritative for the owners it
//!   lists: their current subscriptions to that event are replaced by the
//!   captured ones, in captured order. Owners that are no longer registered
//!   are dropped. Subscribers of that event from other owners stay, after the
//!   restored ones.
//! - Events the snapshot does not mention are left alone.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::snapshot::{ComponentState, CrossFrameworkSnapshot, SnapshotId, SubscriptionRecord};
use crate::error::ReloadError;
use crate::reactive::{apply_values, values_of, EventMap, IslandMap, Runtime, Subscription};

/// What a restore actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub snapshot: Option<SnapshotId>,
    /// Signals whose value changed (or were recreated) by the restore.
    pub signals_restored: usize,
    pub subscriptions_restored: usize,
    /// Captured subscriptions whose owner is gone or whose callback was lost.
    pub subscriptions_dropped: usize,
    /// Captured connections that are no longer registered.
    pub islands_skipped: usize,
    pub component_states_restored: usize,
}

/// Snapshots and restores a [`Runtime`].
#[derive(Debug, Clone)]
pub struct StatePreservationManager {
    runtime: Runtime,
    preserve_component_state: bool,
}

impl StatePreservationManager {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            preserve_component_state: true,
        }
    }

    /// Whether framework-local island state is captured too.
    pub fn with_component_state(mut self, enabled: bool) -> Self {
        self.preserve_component_state = enabled;
        self
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Capture signals and subscriptions.
    pub fn snapshot(&self) -> CrossFrameworkSnapshot {
        self.capture(false)
    }

    /// Capture under one combined read lock, optionally with connections.
    pub(crate) fn capture(&self, include_connections: bool) -> CrossFrameworkSnapshot {
        let preserve_state = self.preserve_component_state && include_connections;
        let snapshot = self.runtime.read_all(|signals, events, islands| {
            let values = values_of(signals);
            let subscriptions = capture_events(events);
            let connections = if include_connections {
                islands.keys().cloned().collect()
            } else {
                Vec::new()
            };
            let states = if preserve_state {
                capture_states(islands)
            } else {
                Vec::new()
            };
            CrossFrameworkSnapshot::from_parts(values, subscriptions, connections)
                .with_component_states(states)
        });

        debug!(
            snapshot = %snapshot.id(),
            signals = snapshot.signal_values().len(),
            events = snapshot.subscriptions().len(),
            connections = snapshot.connections().len(),
            "state captured"
        );
        snapshot
    }

    /// Restore a snapshot. Returns false if it was structurally invalid, in
    /// which case nothing was changed.
    pub fn restore(&self, snapshot: CrossFrameworkSnapshot) -> bool {
        match self.restore_report(snapshot) {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "snapshot rejected");
                false
            }
        }
    }

    /// Restore a snapshot and report what changed.
    pub fn restore_report(
        &self,
        snapshot: CrossFrameworkSnapshot,
    ) -> Result<RestoreReport, ReloadError> {
        snapshot.validate()?;

        let id = snapshot.id();
        let (values, subscriptions, connections, states) = snapshot.into_parts();

        let (report, changed) = self.runtime.write_all(|signals, events, islands| {
            let mut report = RestoreReport {
                snapshot: Some(id),
                ..Default::default()
            };

            let changed = apply_values(signals, &values);
            report.signals_restored = changed.len();

            for (event, records) in subscriptions {
                restore_event(events, islands, event, records, &mut report);
            }

            report.islands_skipped = connections
                .iter()
                .filter(|c| !islands.contains_key(*c))
                .count();

            for ComponentState { component, state } in states {
                if let Some(island) = islands.get_mut(&component) {
                    island.local_state = Some(state);
                    report.component_states_restored += 1;
                }
            }

            (report, changed)
        });

        // Watchers run after every lock is released.
        self.runtime.signals().notify(&changed);

        debug!(
            snapshot = %id,
            signals = report.signals_restored,
            subscriptions = report.subscriptions_restored,
            dropped = report.subscriptions_dropped,
            skipped = report.islands_skipped,
            "state restored"
        );
        Ok(report)
    }
}

fn capture_events(events: &EventMap) -> IndexMap<String, Vec<SubscriptionRecord>> {
    events
        .iter()
        .map(|(event, subs)| {
            let records = subs
                .iter()
                .map(|s| SubscriptionRecord::new(s.id, s.owner.clone(), s.callback.clone()))
                .collect();
            (event.clone(), records)
        })
        .collect()
}

fn capture_states(islands: &IslandMap) -> Vec<ComponentState> {
    islands
        .values()
        .filter_map(|island| {
            island.local_state.as_ref().map(|state| ComponentState {
                component: island.component.clone(),
                state: state.clone(),
            })
        })
        .collect()
}

fn restore_event(
    events: &mut EventMap,
    islands: &IslandMap,
    event: String,
    records: Vec<SubscriptionRecord>,
    report: &mut RestoreReport,
) {
    let mut restored = Vec::with_capacity(records.len());
    let mut owners = HashSet::new();

    for record in records {
        if !islands.contains_key(&record.owner) {
            trace!(event = %event, owner = %record.owner, "owner gone, subscription dropped");
            report.subscriptions_dropped += 1;
            continue;
        }
        let Some(callback) = record.callback else {
            report.subscriptions_dropped += 1;
            continue;
        };
        owners.insert(record.owner.clone());
        restored.push(Subscription {
            id: record.id,
            event: event.clone(),
            owner: record.owner,
            callback,
        });
    }
    report.subscriptions_restored += restored.len();

    let current = events.get(&event).cloned().unwrap_or_default();
    restored.extend(current.into_iter().filter(|s| !owners.contains(&s.owner)));

    if restored.is_empty() {
        events.shift_remove(&event);
    } else {
        events.insert(event, restored);
    }
}
