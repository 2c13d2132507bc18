//! Error Types
//!
//! Every failure a reload can run into is folded into [`ReloadError`] before it
//! reaches the caller. The orchestrator never lets one of these escape
//! `handle_file_change` as a panic or an `Err`; it becomes part of the
//! [`ReloadOutcome`](crate::reload::ReloadOutcome) instead.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Phase of a reload that can time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPhase {
    Compile,
    Sync,
}

impl fmt::Display for ReloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadPhase::Compile => f.write_str("compile"),
            ReloadPhase::Sync => f.write_str("sync"),
        }
    }
}

/// Coarse classification of a [`ReloadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Compilation,
    Sync,
    Timeout,
    Validation,
    StructuralSnapshot,
}

/// Errors produced while reloading a file.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum ReloadError {
    /// The external compiler rejected the file. State is restored in
    /// graceful mode.
    #[error("compilation failed for {path}: {message}")]
    Compilation {
        path: String,
        message: String,
        diagnostics: Vec<String>,
    },

    /// Cross-framework synchronization failed. The reload still commits.
    #[error("framework sync failed: {0}")]
    Sync(String),

    /// A phase exceeded its time budget.
    #[error("{phase} phase timed out after {elapsed_ms}ms")]
    Timeout { phase: ReloadPhase, elapsed_ms: u64 },

    /// The request itself was unusable. No snapshot is taken, no retry.
    #[error("invalid reload request: {0}")]
    Validation(String),

    /// A snapshot handed to restore was malformed.
    #[error("malformed snapshot: {0}")]
    StructuralSnapshot(String),
}

impl ReloadError {
    pub fn compilation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compilation {
            path: path.into(),
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReloadError::Compilation { .. } => ErrorKind::Compilation,
            ReloadError::Sync(_) => ErrorKind::Sync,
            ReloadError::Timeout { .. } => ErrorKind::Timeout,
            ReloadError::Validation(_) => ErrorKind::Validation,
            ReloadError::StructuralSnapshot(_) => ErrorKind::StructuralSnapshot,
        }
    }

    /// Whether the developer's session survives this error.
    ///
    /// Only validation failures are terminal for the request; everything else
    /// falls back to the pre-reload state.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ReloadError::Validation(_))
    }
}

/// Errors from loading or validating a [`ReloadConfig`](crate::ReloadConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{field}` must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },

    #[error("invalid reload config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from reading an MTM frontmatter block.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("unterminated frontmatter block")]
    Unterminated,

    #[error("frontmatter is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            ReloadError::compilation("a.mtm", "boom").kind(),
            ErrorKind::Compilation
        );
        assert_eq!(ReloadError::Sync("x".into()).kind(), ErrorKind::Sync);
        assert_eq!(
            ReloadError::Timeout {
                phase: ReloadPhase::Compile,
                elapsed_ms: 10
            }
            .kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn only_validation_is_unrecoverable() {
        assert!(!ReloadError::Validation("empty path".into()).is_recoverable());
        assert!(ReloadError::StructuralSnapshot("bad".into()).is_recoverable());
        assert!(ReloadError::Sync("late".into()).is_recoverable());
    }

    #[test]
    fn timeout_message_names_phase() {
        let err = ReloadError::Timeout {
            phase: ReloadPhase::Sync,
            elapsed_ms: 1500,
        };
        assert_eq!(err.to_string(), "sync phase timed out after 1500ms");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(ReloadError::Validation("empty".into())).unwrap();
        assert_eq!(json["kind"], "validation");
    }
}
