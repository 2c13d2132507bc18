//! Reload Scheduler
//!
//! The scheduler decides when a file-change event turns into a running
//! reload. It is a plain state machine: the orchestrator's driver feeds it
//! events and the current time, and it hands back tasks that may start.
//!
//! # Algorithm
//!
//! 1. An event for a path with no live task creates a `Queued` task and
//!    starts the path's debounce timer.
//! 2. An event for a path whose task is still `Queued` is merged into it
//!    (latest content wins) and resets the timer.
//! 3. An event for a path whose task is `Compiling` or `Syncing` is parked
//!    as a follow-up. When the running task finishes, the follow-up becomes
//!    a new task with the next attempt number.
//! 4. Expired timers move their paths onto a FIFO ready queue.
//! 5. Ready paths are dispatched while fewer than `max_concurrent` tasks
//!    are compiling or syncing.
//!
//! In strict mode a failed path is halted. Events for it are held until
//! [`ReloadScheduler::acknowledge`] is called.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::debounce::Debouncer;
use super::task::{FileType, ReloadOutcome, ReloadTask, TaskId, TaskStatus};

/// Receives the outcome of the task an event ended up in.
pub type Waiter = oneshot::Sender<ReloadOutcome>;

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadStats {
    pub queued_reloads: usize,
    pub active_reloads: usize,
    pub completed_reloads: u64,
    pub failed_reloads: u64,
    /// Events merged into an existing task or follow-up.
    pub coalesced_events: u64,
    pub degraded_syncs: u64,
    pub halted_files: usize,
}

/// What happened to an event handed to [`ReloadScheduler::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new task was created.
    Created(TaskId),
    /// Merged into a task that has not started yet.
    Coalesced(TaskId),
    /// Parked behind the running task with this id.
    Deferred(TaskId),
    /// The path is halted after a strict-mode failure.
    Held,
    /// The scheduler no longer accepts events.
    Closed,
}

#[derive(Debug)]
struct PendingEvent {
    file_type: FileType,
    content: Option<String>,
    waiters: Vec<Waiter>,
}

impl PendingEvent {
    fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            content: None,
            waiters: Vec::new(),
        }
    }

    fn merge(&mut self, file_type: FileType, content: Option<String>, waiter: Option<Waiter>) {
        self.file_type = file_type;
        self.content = content;
        self.waiters.extend(waiter);
    }
}

#[derive(Debug)]
struct Entry {
    task: ReloadTask,
    waiters: Vec<Waiter>,
    follow_up: Option<PendingEvent>,
}

#[derive(Debug)]
pub struct ReloadScheduler {
    max_concurrent: usize,
    strict: bool,
    debouncer: Debouncer,
    /// The single non-terminal task of each path.
    entries: IndexMap<PathBuf, Entry>,
    ready: VecDeque<PathBuf>,
    active: usize,
    halted: IndexMap<PathBuf, Option<PendingEvent>>,
    closed: bool,
    completed: u64,
    failed: u64,
    coalesced: u64,
    degraded: u64,
}

impl ReloadScheduler {
    pub fn new(max_concurrent: usize, debounce: Duration, strict: bool) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            strict,
            debouncer: Debouncer::new(debounce),
            entries: IndexMap::new(),
            ready: VecDeque::new(),
            active: 0,
            halted: IndexMap::new(),
            closed: false,
            completed: 0,
            failed: 0,
            coalesced: 0,
            degraded: 0,
        }
    }

    /// Accept a file-change event.
    pub fn enqueue(
        &mut self,
        path: PathBuf,
        file_type: FileType,
        content: Option<String>,
        waiter: Option<Waiter>,
        now: Instant,
    ) -> Admission {
        if self.closed {
            return Admission::Closed;
        }

        if let Some(held) = self.halted.get_mut(&path) {
            held.get_or_insert_with(|| PendingEvent::new(file_type))
                .merge(file_type, content, waiter);
            debug!(path = %path.display(), "event held for halted file");
            return Admission::Held;
        }

        match self.entries.get_mut(&path) {
            Some(entry) if entry.task.status == TaskStatus::Queued => {
                entry.task.file_type = file_type;
                entry.task.content = content;
                entry.waiters.extend(waiter);
                // Already on the ready queue means the window has closed.
                if self.debouncer.is_pending(&path) {
                    let fires_at = self.debouncer.schedule(&path, now);
                    debug!(
                        path = %path.display(),
                        fires_in_ms = fires_at.saturating_duration_since(now).as_millis() as u64,
                        "debounce window reset"
                    );
                }
                self.coalesced += 1;
                Admission::Coalesced(entry.task.id)
            }
            Some(entry) => {
                match &mut entry.follow_up {
                    Some(pending) => {
                        pending.merge(file_type, content, waiter);
                        self.coalesced += 1;
                    }
                    None => {
                        let mut pending = PendingEvent::new(file_type);
                        pending.merge(file_type, content, waiter);
                        entry.follow_up = Some(pending);
                    }
                }
                Admission::Deferred(entry.task.id)
            }
            None => {
                let id = self.admit(path, file_type, content, waiter.into_iter().collect(), now, 1);
                Admission::Created(id)
            }
        }
    }

    fn admit(
        &mut self,
        path: PathBuf,
        file_type: FileType,
        content: Option<String>,
        waiters: Vec<Waiter>,
        now: Instant,
        attempt: u32,
    ) -> TaskId {
        let task = ReloadTask::new(path.clone(), file_type, content, now, attempt);
        let id = task.id;
        debug!(task = %id, path = %path.display(), attempt, "reload queued");
        self.debouncer.schedule(&path, now);
        self.entries.insert(
            path,
            Entry {
                task,
                waiters,
                follow_up: None,
            },
        );
        id
    }

    /// Move paths whose debounce window has closed onto the ready queue.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        for path in self.debouncer.due(now) {
            let queued = self
                .entries
                .get(&path)
                .is_some_and(|e| e.task.status == TaskStatus::Queued);
            if queued {
                self.ready.push_back(path);
                fired += 1;
            }
        }
        fired
    }

    /// Earliest debounce deadline still pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// Start as many ready tasks as the concurrency cap allows, in FIFO
    /// order. Returned tasks are already `Compiling` and own their content.
    pub fn dispatch(&mut self) -> Vec<ReloadTask> {
        let mut started = Vec::new();
        while self.active < self.max_concurrent {
            let Some(path) = self.ready.pop_front() else {
                break;
            };
            let Some(entry) = self.entries.get_mut(&path) else {
                continue;
            };
            if !entry.task.advance(TaskStatus::Compiling) {
                continue;
            }
            self.active += 1;
            let content = entry.task.content.take();
            let mut task = entry.task.clone();
            task.content = content;
            started.push(task);
        }
        started
    }

    pub fn mark_syncing(&mut self, path: &Path) -> bool {
        self.entries
            .get_mut(path)
            .is_some_and(|e| e.task.advance(TaskStatus::Syncing))
    }

    /// Retire the running task of `path` and return the waiters that should
    /// receive `outcome`.
    pub fn finish(&mut self, path: &Path, outcome: &ReloadOutcome, now: Instant) -> Vec<Waiter> {
        let Some(Entry {
            task,
            waiters,
            follow_up,
        }) = self.entries.shift_remove(path)
        else {
            return Vec::new();
        };

        if task.status.is_active() {
            self.active = self.active.saturating_sub(1);
        }
        if outcome.success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        if outcome.sync_degraded {
            self.degraded += 1;
        }

        if !outcome.success && self.strict {
            warn!(
                path = %path.display(),
                task = %task.id,
                "file halted until the failure is acknowledged"
            );
            self.halted.insert(path.to_path_buf(), follow_up);
        } else if let Some(next) = follow_up {
            if !self.closed {
                self.admit(
                    path.to_path_buf(),
                    next.file_type,
                    next.content,
                    next.waiters,
                    now,
                    task.attempt + 1,
                );
            }
        }

        waiters
    }

    /// Count a request rejected before it reached the queue.
    pub fn record_rejected(&mut self) {
        self.failed += 1;
    }

    /// Release a halted path. Held events become a fresh task.
    pub fn acknowledge(&mut self, path: &Path, now: Instant) -> bool {
        let Some(held) = self.halted.shift_remove(path) else {
            return false;
        };
        if let Some(event) = held {
            self.admit(path.to_path_buf(), event.file_type, event.content, event.waiters, now, 1);
        }
        true
    }

    pub fn is_halted(&self, path: &Path) -> bool {
        self.halted.contains_key(path)
    }

    pub fn status(&self, path: &Path) -> Option<TaskStatus> {
        self.entries.get(path).map(|e| e.task.status)
    }

    /// Stop accepting events and drop everything that has not started.
    /// Running tasks still finish and report.
    pub fn close(&mut self) {
        self.closed = true;
        let debouncer = &mut self.debouncer;
        self.entries.retain(|path, entry| {
            entry.follow_up = None;
            let keep = entry.task.status.is_active();
            if !keep {
                debouncer.cancel(path);
            }
            keep
        });
        self.ready.clear();
        self.halted.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn stats(&self) -> ReloadStats {
        ReloadStats {
            queued_reloads: self
                .entries
                .values()
                .filter(|e| e.task.status == TaskStatus::Queued)
                .count(),
            active_reloads: self.active,
            completed_reloads: self.completed,
            failed_reloads: self.failed,
            coalesced_events: self.coalesced,
            degraded_syncs: self.degraded,
            halted_files: self.halted.len(),
        }
    }
}
