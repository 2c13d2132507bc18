//! Progress reporting for the developer.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, trace, warn};

use super::task::FileType;
use crate::error::ReloadError;

/// Summary handed to [`ReloadObserver::complete_reload`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub success: bool,
    pub duration: Duration,
    /// None when the file type does not carry component state.
    pub state_preserved: Option<bool>,
    pub sync_degraded: bool,
    pub error: Option<ReloadError>,
}

/// Receives lifecycle callbacks for each reload. Every method defaults to a
/// no-op, so implementors pick what they care about.
pub trait ReloadObserver: Send + Sync {
    fn start_reload(&self, _file_path: &Path, _file_type: FileType) {}

    fn update_progress(&self, _file_path: &Path, _percent: u8, _label: Option<&str>) {}

    fn complete_reload(&self, _file_path: &Path, _report: &CompletionReport) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ReloadObserver for NoopObserver {}

/// Logs every callback through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ReloadObserver for TracingObserver {
    fn start_reload(&self, file_path: &Path, file_type: FileType) {
        info!(path = %file_path.display(), ?file_type, "reload started");
    }

    fn update_progress(&self, file_path: &Path, percent: u8, label: Option<&str>) {
        trace!(path = %file_path.display(), percent, label, "reload progress");
    }

    fn complete_reload(&self, file_path: &Path, report: &CompletionReport) {
        let ms = report.duration.as_millis() as u64;
        match &report.error {
            None => info!(path = %file_path.display(), ms, "reload complete"),
            Some(err) if report.success => {
                warn!(
                    path = %file_path.display(),
                    ms,
                    error = %err,
                    "reload committed with degraded sync"
                )
            }
            Some(err) => warn!(path = %file_path.display(), ms, error = %err, "reload failed"),
        }
    }
}
