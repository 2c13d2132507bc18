//! The compiler seam.
//!
//! Compilation happens outside the orchestrator. The orchestrator only
//! needs to know whether it produced code or diagnostics.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReloadError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub code: String,
    /// Compiler diagnostics. Any entry fails the reload.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl CompileOutput {
    pub fn ok(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            code: String::new(),
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert diagnostics into a compilation error for `path`.
    pub fn into_result(self, path: &Path) -> Result<Self, ReloadError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = match self.errors.as_slice() {
            [only] => only.clone(),
            many => format!("{} (and {} more)", many[0], many.len() - 1),
        };
        Err(ReloadError::Compilation {
            path: path.display().to_string(),
            message,
            diagnostics: self.errors,
        })
    }
}

/// Turns a changed source file into loadable code.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, path: &Path, content: &str) -> Result<CompileOutput, ReloadError>;
}

/// Passes the source through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompiler;

#[async_trait]
impl Compiler for PassthroughCompiler {
    async fn compile(&self, _path: &Path, content: &str) -> Result<CompileOutput, ReloadError> {
        Ok(CompileOutput::ok(content))
    }
}
