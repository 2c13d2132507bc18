//! Reload Scheduling and Orchestration
//!
//! File-change events come in through [`ReloadOrchestrator::handle_file_change`].
//! The [`ReloadScheduler`] debounces them per path, keeps at most one live
//! task per path and caps how many tasks compile at once. Each dispatched
//! task then walks a fixed lifecycle:
//!
//! ```text
//! queued ──▶ compiling ──▶ syncing ──▶ committed
//!   │            │
//!   └────────────┴──────────▶ failed
//! ```
//!
//! The compiler, the dev-server channel, the framework bridge and the
//! progress observer are all traits, so the orchestrator can be driven
//! entirely in-process.

mod channel;
mod compiler;
mod debounce;
mod feedback;
mod orchestrator;
mod scheduler;
mod task;

pub use channel::{
    DevServerChannel, DevServerMessage, HotReloadPayload, MemoryChannel, ModuleUpdate, NullChannel,
    HOT_RELOAD_EVENT,
};
pub use compiler::{CompileOutput, Compiler, PassthroughCompiler};
pub use debounce::Debouncer;
pub use feedback::{CompletionReport, NoopObserver, ReloadObserver, TracingObserver};
pub use orchestrator::{ReloadOrchestrator, ReloadOrchestratorBuilder};
pub use scheduler::{Admission, ReloadScheduler, ReloadStats, Waiter};
pub use task::{FileType, ReloadOutcome, ReloadTask, TaskId, TaskStatus};
