//! Cross-Framework Synchronization
//!
//! Keeps state created by one framework island visible to the others across a
//! reload, and turns frontmatter changes into re-subscription and remount
//! work.

mod directive;
mod synchronizer;

pub use directive::{
    FrameworkBridge, NoopBridge, SyncDirective, CHANNELS_UPDATE_EVENT, FRAMEWORK_REMOUNT_EVENT,
};
pub use synchronizer::{CrossFrameworkSynchronizer, SyncStats};
