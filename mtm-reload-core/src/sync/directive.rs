//! Sync directives.
//!
//! When a frontmatter change needs more than a value restore (new channels, a
//! different target framework), the synchronizer describes the extra work as
//! directives. A [`FrameworkBridge`] carries them out on the framework side.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ReloadError;
use crate::reactive::{ComponentRef, Framework};

/// Dev-server event announcing channel re-subscription.
pub const CHANNELS_UPDATE_EVENT: &str = "mtm:channels-update";

/// Dev-server event announcing an island remount.
pub const FRAMEWORK_REMOUNT_EVENT: &str = "mtm:framework-remount";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SyncDirective {
    /// The file's channel list changed.
    Resubscribe {
        file: PathBuf,
        added: Vec<String>,
        removed: Vec<String>,
        islands: Vec<ComponentRef>,
    },
    /// The file now targets a different framework.
    Remount {
        file: PathBuf,
        from: Option<Framework>,
        to: Option<Framework>,
        islands: Vec<ComponentRef>,
    },
}

impl SyncDirective {
    pub fn event_name(&self) -> &'static str {
        match self {
            SyncDirective::Resubscribe { .. } => CHANNELS_UPDATE_EVENT,
            SyncDirective::Remount { .. } => FRAMEWORK_REMOUNT_EVENT,
        }
    }

    pub fn islands(&self) -> &[ComponentRef] {
        match self {
            SyncDirective::Resubscribe { islands, .. } | SyncDirective::Remount { islands, .. } => {
                islands
            }
        }
    }
}

/// Framework-specific side of synchronization.
#[async_trait]
pub trait FrameworkBridge: Send + Sync {
    async fn apply(&self, directive: &SyncDirective) -> Result<(), ReloadError>;
}

/// Bridge for setups with no framework adapters attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBridge;

#[async_trait]
impl FrameworkBridge for NoopBridge {
    async fn apply(&self, _directive: &SyncDirective) -> Result<(), ReloadError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names() {
        let resub = SyncDirective::Resubscribe {
            file: PathBuf::from("a.mtm"),
            added: vec!["x".into()],
            removed: Vec::new(),
            islands: Vec::new(),
        };
        assert_eq!(resub.event_name(), CHANNELS_UPDATE_EVENT);

        let remount = SyncDirective::Remount {
            file: PathBuf::from("a.mtm"),
            from: Some(Framework::React),
            to: Some(Framework::Vue),
            islands: vec![ComponentRef::new(Framework::React, "A")],
        };
        assert_eq!(remount.event_name(), FRAMEWORK_REMOUNT_EVENT);
        assert_eq!(remount.islands().len(), 1);
    }

    #[test]
    fn serializes_with_kind() {
        let remount = SyncDirective::Remount {
            file: PathBuf::from("a.mtm"),
            from: Some(Framework::React),
            to: Some(Framework::Vue),
            islands: Vec::new(),
        };
        let json = serde_json::to_value(&remount).unwrap();
        assert_eq!(json["kind"], "remount");
        assert_eq!(json["to"], "vue");
    }

    #[tokio::test]
    async fn noop_bridge_accepts_everything() {
        let directive = SyncDirective::Resubscribe {
            file: PathBuf::from("a.mtm"),
            added: Vec::new(),
            removed: Vec::new(),
            islands: Vec::new(),
        };
        assert!(NoopBridge.apply(&directive).await.is_ok());
    }
}
