//! MTM Reload Core
//!
//! This crate provides the hot-reload engine for MTM components. It
//! implements:
//!
//! - A keyed signal store, pub/sub bus and island registry shared by every
//!   framework on the page
//! - Snapshots of that state taken before a reload and restored after it
//! - Classification of frontmatter edits (target framework, channels,
//!   imports, route)
//! - A debounced, concurrency-capped reload scheduler with graceful and
//!   strict failure handling
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals, subscriptions and the island registry
//! - `preserve`: Snapshot capture and restore
//! - `frontmatter`: Frontmatter parsing and the change classifier
//! - `sync`: Cross-framework bookkeeping and sync directives
//! - `reload`: Task lifecycle, scheduling and the orchestrator
//! - `config`: Orchestrator options
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mtm_reload_core::reload::{FileType, PassthroughCompiler, ReloadOrchestrator};
//! use mtm_reload_core::Runtime;
//!
//! let runtime = Runtime::new();
//! runtime.signals().set("counter", 5);
//!
//! let orchestrator = ReloadOrchestrator::builder(runtime.clone(), Arc::new(PassthroughCompiler))
//!     .spawn()?;
//!
//! let outcome = orchestrator
//!     .handle_file_change("src/Counter.mtm", FileType::Mtm, None)
//!     .await;
//! assert!(outcome.success);
//! // The counter survived the reload.
//! assert_eq!(runtime.signals().get("counter"), Some(5.into()));
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod frontmatter;
pub mod preserve;
pub mod reactive;
pub mod reload;
pub mod sync;

pub use config::{ErrorRecoveryMode, ReloadConfig};
pub use error::{ConfigError, ErrorKind, FrontmatterError, ReloadError, ReloadPhase};
pub use preserve::{CrossFrameworkSnapshot, StatePreservationManager};
pub use reactive::{ComponentRef, Framework, Runtime};
pub use reload::{FileType, ReloadOrchestrator, ReloadOutcome};
pub use sync::CrossFrameworkSynchronizer;
