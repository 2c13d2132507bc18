//! Cross-Framework Synchronizer
//!
//! Tracks live islands and wraps the preservation manager so that a snapshot
//! also records which islands were connected when it was taken.
//!
//! Sync is best effort. A restore that fails is reported as a partial-sync
//! failure; it never blocks the commit of a successfully compiled file.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::SyncDirective;
use crate::error::ReloadError;
use crate::frontmatter::{ChangeType, FrontmatterDiff};
use crate::preserve::{CrossFrameworkSnapshot, RestoreReport, StatePreservationManager};
use crate::reactive::{ComponentRef, Framework, Island, Runtime};

/// Counters kept by the synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub snapshots: u64,
    pub restores: u64,
    pub partial_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    snapshots: AtomicU64,
    restores: AtomicU64,
    partial_failures: AtomicU64,
}

#[derive(Debug)]
pub struct CrossFrameworkSynchronizer {
    runtime: Runtime,
    preservation: StatePreservationManager,
    counters: Counters,
}

impl CrossFrameworkSynchronizer {
    pub fn new(runtime: Runtime) -> Self {
        let preservation = StatePreservationManager::new(runtime.clone());
        Self::with_manager(preservation)
    }

    pub fn with_manager(preservation: StatePreservationManager) -> Self {
        Self {
            runtime: preservation.runtime().clone(),
            preservation,
            counters: Counters::default(),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn preservation(&self) -> &StatePreservationManager {
        &self.preservation
    }

    pub fn register_component(
        &self,
        framework: Framework,
        component_id: impl Into<String>,
    ) -> ComponentRef {
        self.runtime.register_component(framework, component_id)
    }

    pub fn register_island(&self, island: Island) -> bool {
        self.runtime.register_island(island)
    }

    pub fn unregister_component(&self, framework: Framework, component_id: &str) -> bool {
        self.runtime
            .unregister_component(&ComponentRef::new(framework, component_id))
    }

    /// Live islands in mount order.
    pub fn connections(&self) -> Vec<ComponentRef> {
        self.runtime.components().connections()
    }

    /// Snapshot signals, subscriptions and the current connections.
    pub fn create_snapshot(&self) -> CrossFrameworkSnapshot {
        self.counters.snapshots.fetch_add(1, Ordering::Relaxed);
        self.preservation.capture(true)
    }

    /// Restore a snapshot. Returns false when nothing was applied.
    pub fn restore_snapshot(&self, snapshot: CrossFrameworkSnapshot) -> bool {
        match self.try_restore(snapshot) {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "partial sync failure");
                false
            }
        }
    }

    /// Restore a snapshot, converting any failure into a [`ReloadError`].
    ///
    /// Connections captured in the snapshot that are gone now are skipped;
    /// islands mounted since are left for their own mount to register.
    pub fn try_restore(
        &self,
        snapshot: CrossFrameworkSnapshot,
    ) -> Result<RestoreReport, ReloadError> {
        let id = snapshot.id();
        let result = catch_unwind(AssertUnwindSafe(|| self.preservation.restore_report(snapshot)))
            .unwrap_or_else(|_| {
                Err(ReloadError::Sync(format!("restore of {id} panicked in a watcher")))
            });

        match &result {
            Ok(report) => {
                self.counters.restores.fetch_add(1, Ordering::Relaxed);
                if report.islands_skipped > 0 {
                    debug!(
                        snapshot = %id,
                        skipped = report.islands_skipped,
                        "islands removed by the edit"
                    );
                }
            }
            Err(_) => {
                self.counters.partial_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Apply the bookkeeping side of a frontmatter change for `file` and
    /// return the directives the framework side still has to carry out.
    ///
    /// - Channel changes drop the file's islands' subscriptions to removed
    ///   channels.
    /// - A target framework change moves the file's islands, and the
    ///   subscriptions they own, over to the new framework. The directive
    ///   lists the islands as they were before the move.
    pub fn reconcile(&self, file: &Path, diff: &FrontmatterDiff) -> Vec<SyncDirective> {
        let mut directives = Vec::new();
        if !diff.has_changes {
            return directives;
        }

        let islands = self.runtime.components().from_source(file);

        if let Some(change) = diff.get(ChangeType::Channels) {
            let removed = change.removed();
            let mut dropped = 0;
            for island in &islands {
                dropped += self
                    .runtime
                    .subscriptions()
                    .unsubscribe_owner_from(island, &removed);
            }
            debug!(file = %file.display(), dropped, "channel subscriptions pruned");
            directives.push(SyncDirective::Resubscribe {
                file: file.to_path_buf(),
                added: change.added(),
                removed,
                islands: islands.clone(),
            });
        }

        if let Some((from, to)) = diff.framework_change() {
            if let Some(framework) = to {
                for island in &islands {
                    self.runtime.rehome_component(island, framework);
                }
            }
            info!(
                file = %file.display(),
                from = ?from,
                to = ?to,
                islands = islands.len(),
                "target framework changed, remounting"
            );
            directives.push(SyncDirective::Remount {
                file: file.to_path_buf(),
                from,
                to,
                islands,
            });
        }

        directives
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            snapshots: self.counters.snapshots.load(Ordering::Relaxed),
            restores: self.counters.restores.load(Ordering::Relaxed),
            partial_failures: self.counters.partial_failures.load(Ordering::Relaxed),
        }
    }
}
