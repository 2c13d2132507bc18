//! Reload Tasks
//!
//! A task is created when the scheduler accepts a file-change event and is
//! gone once it reaches a terminal status and its outcome has been handed
//! out.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ReloadError;
use crate::frontmatter::{FrontmatterDiff, ReloadStrategy};
use crate::sync::SyncDirective;

/// Unique identifier for a reload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reload-{}", self.0)
    }
}

/// Kind of file that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// An MTM component source.
    Mtm,
    /// A framework-native component (`.jsx`, `.vue`, `.svelte`, ...).
    Native,
    /// A module imported by components.
    Dependency,
    Css,
}

impl FileType {
    /// Guess the file type from an extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "mtm" => FileType::Mtm,
            "jsx" | "tsx" | "vue" | "svelte" => FileType::Native,
            "css" | "scss" | "sass" | "less" | "pcss" => FileType::Css,
            _ => FileType::Dependency,
        }
    }

    /// Whether reloading this kind of file snapshots component state.
    pub fn preserves_state(&self) -> bool {
        matches!(self, FileType::Mtm | FileType::Native)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Compiling,
    Syncing,
    Committed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Committed | TaskStatus::Failed)
    }

    /// Counts against the concurrency cap.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Compiling | TaskStatus::Syncing)
    }

    fn can_become(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Queued, Compiling)
                | (Queued, Failed)
                | (Compiling, Syncing)
                | (Compiling, Failed)
                | (Syncing, Committed)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReloadTask {
    pub id: TaskId,
    pub file_path: PathBuf,
    pub file_type: FileType,
    pub status: TaskStatus,
    pub enqueued_at: Instant,
    /// 1 for the first task of a path, incremented for each follow-up.
    pub attempt: u32,
    /// Latest content seen for the path, if the event carried it.
    pub content: Option<String>,
}

impl ReloadTask {
    pub fn new(
        file_path: PathBuf,
        file_type: FileType,
        content: Option<String>,
        now: Instant,
        attempt: u32,
    ) -> Self {
        Self {
            id: TaskId::next(),
            file_path,
            file_type,
            status: TaskStatus::Queued,
            enqueued_at: now,
            attempt,
            content,
        }
    }

    /// Move to `next` if the lifecycle allows it.
    pub fn advance(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_become(next) {
            debug_assert!(false, "invalid task transition {:?} -> {:?}", self.status, next);
            return false;
        }
        self.status = next;
        true
    }
}

/// Final report for one reload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadOutcome {
    /// None when the request was rejected before a task existed.
    pub task_id: Option<TaskId>,
    pub file_path: PathBuf,
    pub file_type: FileType,
    pub status: TaskStatus,
    pub success: bool,
    pub duration_ms: u64,
    /// The pre-reload snapshot was restored.
    pub state_preserved: bool,
    /// Committed, but synchronization failed or ran out of time.
    pub sync_degraded: bool,
    pub strategy: Option<ReloadStrategy>,
    pub changes: FrontmatterDiff,
    pub directives: Vec<SyncDirective>,
    pub attempt: u32,
    pub error: Option<ReloadError>,
}

impl ReloadOutcome {
    /// Outcome for a request that failed validation.
    pub fn rejected(file_path: PathBuf, file_type: FileType, error: ReloadError) -> Self {
        Self {
            task_id: None,
            file_path,
            file_type,
            status: TaskStatus::Failed,
            success: false,
            duration_ms: 0,
            state_preserved: false,
            sync_degraded: false,
            strategy: None,
            changes: FrontmatterDiff::none(),
            directives: Vec::new(),
            attempt: 0,
            error: Some(error),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.status == TaskStatus::Committed
    }
}
