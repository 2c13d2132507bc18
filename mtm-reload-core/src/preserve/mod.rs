//! State Preservation
//!
//! Snapshot the runtime before a reload, put it back afterwards.
//!
//! A snapshot is taken as one logical read across signals, subscriptions and
//! islands; a restore applies as one logical batch under the same locks. Code
//! reading signals concurrently sees either the pre-reload values or the
//! restored ones, never a mix.

mod manager;
mod snapshot;

pub use manager::{RestoreReport, StatePreservationManager};
pub use snapshot::{ComponentState, CrossFrameworkSnapshot, SnapshotId, SubscriptionRecord};
