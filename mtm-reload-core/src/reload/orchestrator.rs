//! Reload Orchestrator
//!
//! Ties the pieces together. A background driver owns the timing: it waits
//! for the next debounce deadline or a wake-up, moves expired paths onto the
//! ready queue and spawns one pipeline per dispatched task.
//!
//! Each pipeline runs:
//!
//! 1. classify the frontmatter change (MTM files only)
//! 2. snapshot signals and subscriptions
//! 3. compile, bounded by `reloadTimeout`
//! 4. on failure: restore (graceful) or halt the file (strict)
//! 5. on success: restore, reconcile and run sync directives bounded by
//!    `syncTimeout`, then notify the dev server and commit
//!
//! A failed sync never blocks the commit; the outcome is flagged
//! `sync_degraded` instead.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, instrument, warn};

use super::channel::{
    DevServerChannel, HotReloadPayload, ModuleUpdate, NullChannel, HOT_RELOAD_EVENT,
};
use super::compiler::Compiler;
use super::feedback::{CompletionReport, ReloadObserver, TracingObserver};
use super::scheduler::{Admission, ReloadScheduler, ReloadStats};
use super::task::{FileType, ReloadOutcome, ReloadTask, TaskStatus};
use crate::clock::unix_millis;
use crate::config::ReloadConfig;
use crate::error::{ConfigError, ReloadError, ReloadPhase};
use crate::frontmatter::{FrontmatterCache, FrontmatterDiff};
use crate::preserve::CrossFrameworkSnapshot;
use crate::reactive::Runtime;
use crate::sync::{CrossFrameworkSynchronizer, FrameworkBridge, NoopBridge, SyncDirective};

/// Builder for [`ReloadOrchestrator`].
pub struct ReloadOrchestratorBuilder {
    runtime: Runtime,
    compiler: Arc<dyn Compiler>,
    config: ReloadConfig,
    channel: Arc<dyn DevServerChannel>,
    observer: Arc<dyn ReloadObserver>,
    bridge: Arc<dyn FrameworkBridge>,
}

impl ReloadOrchestratorBuilder {
    pub fn config(mut self, config: ReloadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn channel(mut self, channel: Arc<dyn DevServerChannel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ReloadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn bridge(mut self, bridge: Arc<dyn FrameworkBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    /// Validate the configuration and start the driver.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> Result<ReloadOrchestrator, ConfigError> {
        self.config.validate()?;

        let scheduler = ReloadScheduler::new(
            self.config.max_concurrent_reloads,
            self.config.debounce(),
            self.config.is_strict(),
        );
        let shared = Arc::new(Shared {
            sync: CrossFrameworkSynchronizer::new(self.runtime),
            frontmatter: FrontmatterCache::new(),
            scheduler: Mutex::new(scheduler),
            wake: Notify::new(),
            compiler: self.compiler,
            channel: self.channel,
            observer: self.observer,
            bridge: self.bridge,
            config: self.config,
        });

        info!(
            debounce_ms = shared.config.debounce().as_millis() as u64,
            max_concurrent = shared.config.max_concurrent_reloads,
            mode = ?shared.config.error_recovery_mode,
            "reload orchestrator started"
        );
        let driver = tokio::spawn(drive(Arc::clone(&shared)));
        Ok(ReloadOrchestrator { shared, driver })
    }
}

/// Accepts file-change events and drives them to a terminal outcome.
///
/// Dropping the orchestrator stops the driver. Tasks already compiling
/// finish on their own.
pub struct ReloadOrchestrator {
    shared: Arc<Shared>,
    driver: JoinHandle<()>,
}

impl ReloadOrchestrator {
    pub fn builder(runtime: Runtime, compiler: Arc<dyn Compiler>) -> ReloadOrchestratorBuilder {
        ReloadOrchestratorBuilder {
            runtime,
            compiler,
            config: ReloadConfig::default(),
            channel: Arc::new(NullChannel),
            observer: Arc::new(TracingObserver),
            bridge: Arc::new(NoopBridge),
        }
    }

    /// Submit a file change and wait for the reload it ends up in.
    ///
    /// Events coalesced into the same task resolve with the same outcome.
    /// When `content` is `None` the file is read from disk at compile time.
    /// Never fails; every error is reported in the outcome.
    pub async fn handle_file_change(
        &self,
        file_path: impl AsRef<Path>,
        file_type: FileType,
        content: Option<String>,
    ) -> ReloadOutcome {
        let path = file_path.as_ref().to_path_buf();
        let rx = match self.submit(&path, file_type, content) {
            Ok(rx) => rx,
            Err(err) => return ReloadOutcome::rejected(path, file_type, err),
        };
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => ReloadOutcome::rejected(
                path,
                file_type,
                ReloadError::Validation("orchestrator shut down before the reload ran".into()),
            ),
        }
    }

    /// Submit a file change without waiting for it.
    pub fn submit(
        &self,
        file_path: impl AsRef<Path>,
        file_type: FileType,
        content: Option<String>,
    ) -> Result<oneshot::Receiver<ReloadOutcome>, ReloadError> {
        let path = file_path.as_ref();
        if let Err(err) = validate_path(path) {
            self.shared.scheduler.lock().record_rejected();
            warn!(error = %err, "file change rejected");
            self.shared.observer.complete_reload(
                path,
                &CompletionReport {
                    success: false,
                    duration: Duration::ZERO,
                    state_preserved: None,
                    sync_degraded: false,
                    error: Some(err.clone()),
                },
            );
            return Err(err);
        }

        let (tx, rx) = oneshot::channel();
        let admission = self.shared.scheduler.lock().enqueue(
            path.to_path_buf(),
            file_type,
            content,
            Some(tx),
            Instant::now(),
        );
        if admission == Admission::Closed {
            return Err(ReloadError::Validation("orchestrator is shut down".into()));
        }
        debug!(path = %path.display(), ?admission, "file change accepted");
        self.shared.wake.notify_one();
        Ok(rx)
    }

    /// Release a file halted by a strict-mode failure.
    pub fn acknowledge_failure(&self, file_path: impl AsRef<Path>) -> bool {
        let path = file_path.as_ref();
        let released = self.shared.scheduler.lock().acknowledge(path, Instant::now());
        if released {
            info!(path = %path.display(), "failure acknowledged");
            self.shared.wake.notify_one();
        }
        released
    }

    pub fn is_halted(&self, file_path: impl AsRef<Path>) -> bool {
        self.shared.scheduler.lock().is_halted(file_path.as_ref())
    }

    pub fn stats(&self) -> ReloadStats {
        self.shared.scheduler.lock().stats()
    }

    pub fn config(&self) -> &ReloadConfig {
        &self.shared.config
    }

    pub fn runtime(&self) -> &Runtime {
        self.shared.sync.runtime()
    }

    pub fn synchronizer(&self) -> &CrossFrameworkSynchronizer {
        &self.shared.sync
    }

    pub fn frontmatter(&self) -> &FrontmatterCache {
        &self.shared.frontmatter
    }

    /// Stop accepting events and drop queued work. Pending callers resolve
    /// with a validation error; running tasks still finish.
    pub fn shutdown(&self) {
        self.shared.scheduler.lock().close();
        self.driver.abort();
        info!("reload orchestrator stopped");
    }
}

impl Drop for ReloadOrchestrator {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl fmt::Debug for ReloadOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadOrchestrator")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn validate_path(path: &Path) -> Result<(), ReloadError> {
    let Some(text) = path.to_str() else {
        return Err(ReloadError::Validation(format!(
            "file path is not valid UTF-8: {}",
            path.display()
        )));
    };
    if text.trim().is_empty() {
        return Err(ReloadError::Validation("file path is empty".into()));
    }
    if text.contains('\0') {
        return Err(ReloadError::Validation("file path contains a NUL byte".into()));
    }
    Ok(())
}

struct Shared {
    config: ReloadConfig,
    scheduler: Mutex<ReloadScheduler>,
    wake: Notify,
    sync: CrossFrameworkSynchronizer,
    frontmatter: FrontmatterCache,
    compiler: Arc<dyn Compiler>,
    channel: Arc<dyn DevServerChannel>,
    observer: Arc<dyn ReloadObserver>,
    bridge: Arc<dyn FrameworkBridge>,
}

async fn drive(shared: Arc<Shared>) {
    loop {
        let started = {
            let mut scheduler = shared.scheduler.lock();
            scheduler.fire_due(Instant::now());
            scheduler.dispatch()
        };
        for task in started {
            tokio::spawn(run_task(Arc::clone(&shared), task));
        }

        let deadline = shared.scheduler.lock().next_deadline();
        match deadline {
            Some(at) => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = time::sleep_until(at) => {}
                }
            }
            None => shared.wake.notified().await,
        }
    }
}

async fn run_task(shared: Arc<Shared>, task: ReloadTask) {
    let path = task.file_path.clone();
    let (id, file_type, attempt) = (task.id, task.file_type, task.attempt);

    let outcome = match AssertUnwindSafe(shared.reload(task)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(task = %id, path = %path.display(), "reload pipeline panicked");
            let mut outcome = ReloadOutcome::rejected(
                path.clone(),
                file_type,
                ReloadError::compilation(path.display().to_string(), "reload pipeline panicked"),
            );
            outcome.task_id = Some(id);
            outcome.attempt = attempt;
            outcome
        }
    };

    let waiters = shared.scheduler.lock().finish(&path, &outcome, Instant::now());
    for waiter in waiters {
        let _ = waiter.send(outcome.clone());
    }
    shared.wake.notify_one();
}

impl Shared {
    #[instrument(
        name = "reload",
        skip_all,
        fields(task = %task.id, path = %task.file_path.display(), attempt = task.attempt)
    )]
    async fn reload(&self, task: ReloadTask) -> ReloadOutcome {
        let started = Instant::now();
        let ReloadTask {
            id,
            file_path: path,
            file_type,
            attempt,
            content,
            ..
        } = task;

        let mut outcome = ReloadOutcome {
            task_id: Some(id),
            file_path: path.clone(),
            file_type,
            status: TaskStatus::Compiling,
            success: false,
            duration_ms: 0,
            state_preserved: false,
            sync_degraded: false,
            strategy: None,
            changes: FrontmatterDiff::none(),
            directives: Vec::new(),
            attempt,
            error: None,
        };
        self.observer.start_reload(&path, file_type);

        // One deadline bounds reading the source and compiling it.
        let deadline = started + self.config.reload_timeout();
        let timed_out = || ReloadError::Timeout {
            phase: ReloadPhase::Compile,
            elapsed_ms: millis(started.elapsed()),
        };

        let content = match content {
            Some(content) => content,
            None => match time::timeout_at(deadline, tokio::fs::read_to_string(&path)).await {
                Ok(Ok(content)) => content,
                Ok(Err(err)) => {
                    let message = format!("cannot read source: {err}");
                    let err = ReloadError::compilation(path.display().to_string(), message);
                    return self.fail(outcome, None, err, started);
                }
                Err(_) => return self.fail(outcome, None, timed_out(), started),
            },
        };

        self.observer.update_progress(&path, 10, Some("classifying"));
        let mut frontmatter = None;
        if file_type == FileType::Mtm {
            (outcome.changes, frontmatter) = self.frontmatter.diff(&path, &content);
        }
        let strategy = outcome.changes.strategy(file_type);
        outcome.strategy = Some(strategy);
        debug!(?strategy, changes = outcome.changes.changes.len(), "change classified");

        let snapshot = (self.config.preserve_state && file_type.preserves_state()).then(|| {
            if self.config.sync_frameworks {
                self.sync.create_snapshot()
            } else {
                self.sync.preservation().snapshot()
            }
        });

        self.observer.update_progress(&path, 30, Some("compiling"));
        let compile = AssertUnwindSafe(self.compiler.compile(&path, &content)).catch_unwind();
        let compiled = match time::timeout_at(deadline, compile).await {
            Err(_) => Err(timed_out()),
            Ok(Err(_)) => Err(ReloadError::compilation(
                path.display().to_string(),
                "compiler panicked",
            )),
            Ok(Ok(result)) => result.and_then(|output| output.into_result(&path)),
        };
        if let Err(err) = compiled {
            return self.fail(outcome, snapshot, err, started);
        }
        if let Some(frontmatter) = frontmatter {
            self.frontmatter.commit(&path, frontmatter);
        }

        self.scheduler.lock().mark_syncing(&path);
        outcome.status = TaskStatus::Syncing;
        self.observer.update_progress(&path, 70, Some("syncing"));

        if let Some(snapshot) = snapshot {
            match self.sync.try_restore(snapshot) {
                Ok(report) => {
                    outcome.state_preserved = true;
                    debug!(
                        signals = report.signals_restored,
                        subscriptions = report.subscriptions_restored,
                        "state restored"
                    );
                }
                Err(err) => degrade(&mut outcome, err),
            }
        }
        if self.config.sync_frameworks {
            outcome.directives = self.sync.reconcile(&path, &outcome.changes);
            if let Err(err) = self.apply_directives(&outcome.directives).await {
                degrade(&mut outcome, err);
            }
        }

        outcome.status = TaskStatus::Committed;
        outcome.success = true;
        self.publish(&outcome);
        self.observer.update_progress(&path, 100, None);

        let elapsed = started.elapsed();
        outcome.duration_ms = millis(elapsed);
        info!(ms = outcome.duration_ms, degraded = outcome.sync_degraded, "reload committed");
        self.observer.complete_reload(&path, &completion(&outcome, elapsed));
        outcome
    }

    fn fail(
        &self,
        mut outcome: ReloadOutcome,
        snapshot: Option<CrossFrameworkSnapshot>,
        err: ReloadError,
        started: Instant,
    ) -> ReloadOutcome {
        outcome.status = TaskStatus::Failed;
        outcome.success = false;
        outcome.state_preserved = match snapshot {
            Some(snapshot) if !self.config.is_strict() => self.sync.restore_snapshot(snapshot),
            _ => false,
        };

        let elapsed = started.elapsed();
        outcome.duration_ms = millis(elapsed);
        warn!(error = %err, restored = outcome.state_preserved, "reload failed");
        outcome.error = Some(err);
        self.observer.complete_reload(&outcome.file_path, &completion(&outcome, elapsed));
        outcome
    }

    async fn apply_directives(&self, directives: &[SyncDirective]) -> Result<(), ReloadError> {
        if directives.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let apply = async {
            for directive in directives {
                self.bridge.apply(directive).await?;
            }
            Ok::<(), ReloadError>(())
        };
        let apply = AssertUnwindSafe(apply).catch_unwind();
        match time::timeout(self.config.sync_timeout(), apply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ReloadError::Sync("framework bridge panicked".into())),
            Err(_) => Err(ReloadError::Timeout {
                phase: ReloadPhase::Sync,
                elapsed_ms: millis(started.elapsed()),
            }),
        }
    }

    /// Send the module update, the hot-reload event and one event per
    /// directive.
    fn publish(&self, outcome: &ReloadOutcome) {
        let file = outcome.file_path.display().to_string();
        let timestamp = unix_millis();

        self.channel.send_update(&ModuleUpdate {
            path: file.clone(),
            accepted_path: file.clone(),
            timestamp,
        });
        let payload = HotReloadPayload {
            file: file.clone(),
            timestamp,
            preserve_state: outcome.state_preserved,
            modules: vec![file],
        };
        self.send_custom(HOT_RELOAD_EVENT, &payload);
        for directive in &outcome.directives {
            self.send_custom(directive.event_name(), directive);
        }
    }

    fn send_custom(&self, event: &str, payload: &impl Serialize) {
        match serde_json::to_value(payload) {
            Ok(value) => self.channel.send_custom(event, &value),
            Err(err) => error!(event, error = %err, "failed to encode dev-server payload"),
        }
    }
}

fn degrade(outcome: &mut ReloadOutcome, err: ReloadError) {
    warn!(error = %err, "sync degraded");
    outcome.sync_degraded = true;
    outcome.error.get_or_insert(err);
}

fn completion(outcome: &ReloadOutcome, duration: Duration) -> CompletionReport {
    CompletionReport {
        success: outcome.success,
        duration,
        state_preserved: outcome.file_type.preserves_state().then_some(outcome.state_preserved),
        sync_degraded: outcome.sync_degraded,
        error: outcome.error.clone(),
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::channel::MemoryChannel;
    use crate::reload::compiler::{CompileOutput, PassthroughCompiler};
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingCompiler;

    #[async_trait]
    impl Compiler for FailingCompiler {
        async fn compile(
            &self,
            _path: &Path,
            _content: &str,
        ) -> Result<CompileOutput, ReloadError> {
            Ok(CompileOutput::failed(["unexpected token"]))
        }
    }

    /// Writes to the store mid-compile, then fails.
    struct MutatingCompiler(Runtime);

    #[async_trait]
    impl Compiler for MutatingCompiler {
        async fn compile(
            &self,
            _path: &Path,
            _content: &str,
        ) -> Result<CompileOutput, ReloadError> {
            self.0.signals().set("count", json!(10));
            Ok(CompileOutput::failed(["unexpected token"]))
        }
    }

    struct PanickingCompiler;

    #[async_trait]
    impl Compiler for PanickingCompiler {
        async fn compile(
            &self,
            _path: &Path,
            _content: &str,
        ) -> Result<CompileOutput, ReloadError> {
            panic!("compiler crashed")
        }
    }

    /// Writes to the store, then hangs past any reasonable timeout.
    struct StallingCompiler(Runtime);

    #[async_trait]
    impl Compiler for StallingCompiler {
        async fn compile(&self, _path: &Path, content: &str) -> Result<CompileOutput, ReloadError> {
            self.0.signals().set("count", json!(99));
            time::sleep(Duration::from_secs(60)).await;
            Ok(CompileOutput::ok(content))
        }
    }

    struct SlowCompiler(Duration);

    #[async_trait]
    impl Compiler for SlowCompiler {
        async fn compile(&self, _path: &Path, content: &str) -> Result<CompileOutput, ReloadError> {
            time::sleep(self.0).await;
            Ok(CompileOutput::ok(content))
        }
    }

    fn orchestrator(compiler: Arc<dyn Compiler>, config: ReloadConfig) -> ReloadOrchestrator {
        ReloadOrchestrator::builder(Runtime::new(), compiler)
            .config(config)
            .spawn()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn commits_and_notifies() {
        let channel = Arc::new(MemoryChannel::new());
        let compiler = Arc::new(PassthroughCompiler);
        let orchestrator = ReloadOrchestrator::builder(Runtime::new(), compiler)
            .channel(channel.clone())
            .spawn()
            .unwrap();

        let outcome = orchestrator
            .handle_file_change("a.mtm", FileType::Mtm, Some("<div/>".into()))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.status, TaskStatus::Committed);
        assert!(outcome.state_preserved);
        assert_eq!(channel.updates().len(), 1);
        let payload = &channel.custom(HOT_RELOAD_EVENT)[0];
        assert_eq!(payload["file"], "a.mtm");
        assert_eq!(payload["preserveState"], true);
        assert_eq!(orchestrator.stats().completed_reloads, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_paths_are_rejected() {
        let orchestrator = orchestrator(Arc::new(PassthroughCompiler), ReloadConfig::default());

        let empty = orchestrator.handle_file_change("", FileType::Mtm, None).await;
        assert!(matches!(empty.error, Some(ReloadError::Validation(_))));
        assert!(empty.task_id.is_none());

        let nul = orchestrator.handle_file_change("a\0.mtm", FileType::Mtm, None).await;
        assert_eq!(nul.status, TaskStatus::Failed);
        assert_eq!(orchestrator.stats().failed_reloads, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_failure_restores_state() {
        let runtime = Runtime::new();
        runtime.signals().set("count", json!(5));
        let compiler = Arc::new(MutatingCompiler(runtime.clone()));
        let orchestrator = ReloadOrchestrator::builder(runtime.clone(), compiler)
            .spawn()
            .unwrap();

        let outcome = orchestrator
            .handle_file_change("a.mtm", FileType::Mtm, Some(String::new()))
            .await;

        assert_eq!(outcome.status, TaskStatus::Failed);
        assert!(outcome.state_preserved);
        assert!(matches!(outcome.error, Some(ReloadError::Compilation { .. })));
        assert_eq!(orchestrator.runtime().signals().get("count"), Some(json!(5)));
        assert!(!orchestrator.is_halted("a.mtm"));
    }

    #[tokio::test(start_paused = true)]
    async fn strict_failure_halts_the_file() {
        let config = ReloadConfig {
            error_recovery_mode: crate::config::ErrorRecoveryMode::Strict,
            ..Default::default()
        };
        let orchestrator = orchestrator(Arc::new(FailingCompiler), config);

        let outcome = orchestrator
            .handle_file_change("a.mtm", FileType::Mtm, Some(String::new()))
            .await;
        assert!(!outcome.success);
        assert!(!outcome.state_preserved);
        assert!(orchestrator.is_halted("a.mtm"));
        assert_eq!(orchestrator.stats().halted_files, 1);

        assert!(orchestrator.acknowledge_failure("a.mtm"));
        assert!(!orchestrator.is_halted("a.mtm"));
    }

    #[tokio::test(start_paused = true)]
    async fn compiler_panic_becomes_failure() {
        let orchestrator = orchestrator(Arc::new(PanickingCompiler), ReloadConfig::default());
        let outcome = orchestrator
            .handle_file_change("a.mtm", FileType::Mtm, Some(String::new()))
            .await;

        assert_eq!(outcome.status, TaskStatus::Failed);
        assert!(outcome.state_preserved);
        assert!(matches!(outcome.error, Some(ReloadError::Compilation { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_compile_times_out() {
        let config = ReloadConfig {
            reload_timeout: 1_000,
            ..Default::default()
        };
        let orchestrator = orchestrator(Arc::new(SlowCompiler(Duration::from_secs(5))), config);
        let outcome = orchestrator
            .handle_file_change("a.mtm", FileType::Mtm, Some(String::new()))
            .await;

        assert_eq!(outcome.status, TaskStatus::Failed);
        assert!(matches!(
            outcome.error,
            Some(ReloadError::Timeout { phase: ReloadPhase::Compile, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_restores_state() {
        let runtime = Runtime::new();
        runtime.signals().set("count", json!(5));
        let config = ReloadConfig {
            reload_timeout: 500,
            ..Default::default()
        };
        let compiler = Arc::new(StallingCompiler(runtime.clone()));
        let orchestrator = ReloadOrchestrator::builder(runtime.clone(), compiler)
            .config(config)
            .spawn()
            .unwrap();

        let outcome = orchestrator
            .handle_file_change("a.mtm", FileType::Mtm, Some(String::new()))
            .await;

        assert!(matches!(
            outcome.error,
            Some(ReloadError::Timeout { phase: ReloadPhase::Compile, .. })
        ));
        assert!(outcome.state_preserved);
        assert_eq!(orchestrator.runtime().signals().get("count"), Some(json!(5)));
        assert_eq!(orchestrator.stats().active_reloads, 0);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn blocked_source_read_times_out() {
        let dir = std::env::temp_dir().join(format!("mtm-fifo-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let fifo = dir.join("Blocked.mtm");
        let made = std::process::Command::new("mkfifo").arg(&fifo).status();
        if !made.is_ok_and(|s| s.success()) {
            return;
        }

        let config = ReloadConfig {
            debounce_ms: 10,
            reload_timeout: 200,
            ..Default::default()
        };
        let orchestrator = orchestrator(Arc::new(PassthroughCompiler), config);
        let outcome = time::timeout(
            Duration::from_secs(3),
            orchestrator.handle_file_change(&fifo, FileType::Mtm, None),
        )
        .await
        .expect("reload never finished");

        assert_eq!(outcome.status, TaskStatus::Failed);
        assert!(matches!(outcome.error, Some(ReloadError::Timeout { .. })));
        assert_eq!(orchestrator.stats().active_reloads, 0);

        // Release the reader still parked on the pipe.
        drop(std::fs::OpenOptions::new().write(true).open(&fifo));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_file_fails_without_content() {
        let orchestrator = orchestrator(Arc::new(PassthroughCompiler), ReloadConfig::default());
        let outcome = orchestrator
            .handle_file_change("/definitely/not/here.mtm", FileType::Mtm, None)
            .await;

        assert_eq!(outcome.status, TaskStatus::Failed);
        assert!(matches!(outcome.error, Some(ReloadError::Compilation { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn css_skips_state_preservation() {
        let orchestrator = orchestrator(Arc::new(PassthroughCompiler), ReloadConfig::default());
        let outcome = orchestrator
            .handle_file_change("theme.css", FileType::Css, Some("a{}".into()))
            .await;

        assert!(outcome.success);
        assert!(!outcome.state_preserved);
        assert_eq!(outcome.strategy, Some(crate::frontmatter::ReloadStrategy::StylesOnly));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_is_refused() {
        let config = ReloadConfig {
            max_concurrent_reloads: 0,
            ..Default::default()
        };
        let result = ReloadOrchestrator::builder(Runtime::new(), Arc::new(PassthroughCompiler))
            .config(config)
            .spawn();
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_rejects_new_events() {
        let orchestrator = orchestrator(Arc::new(PassthroughCompiler), ReloadConfig::default());
        orchestrator.shutdown();

        let outcome = orchestrator
            .handle_file_change("a.mtm", FileType::Mtm, Some(String::new()))
            .await;
        assert!(matches!(outcome.error, Some(ReloadError::Validation(_))));
    }
}
