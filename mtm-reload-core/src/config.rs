//! Reload Configuration
//!
//! Options recognized by the orchestrator. Field names follow the dev server's
//! camelCase JSON so a config block can be passed through verbatim.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What to do when a file fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorRecoveryMode {
    /// Restore the pre-reload state and keep the session interactive.
    #[default]
    Graceful,
    /// Skip the restore and halt the file's queue until acknowledged.
    Strict,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReloadConfig {
    /// Snapshot and restore signals/subscriptions around each reload.
    pub preserve_state: bool,

    /// Coalesce rapid events through the debounce window. When false, events
    /// are dispatched as soon as a slot is free.
    pub batch_updates: bool,

    /// Quiet period after the last event before a task is dispatched.
    pub debounce_ms: u64,

    /// Capture island connections and run sync directives.
    pub sync_frameworks: bool,

    /// Budget for the synchronization phase.
    pub sync_timeout: u64,

    /// Tasks allowed in compiling/syncing at once.
    pub max_concurrent_reloads: usize,

    /// Budget for the whole task up to the commit decision.
    pub reload_timeout: u64,

    pub error_recovery_mode: ErrorRecoveryMode,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            preserve_state: true,
            batch_updates: true,
            debounce_ms: 100,
            sync_frameworks: true,
            sync_timeout: 5_000,
            max_concurrent_reloads: 3,
            reload_timeout: 10_000,
            error_recovery_mode: ErrorRecoveryMode::Graceful,
        }
    }
}

impl ReloadConfig {
    pub const DEBOUNCE_RANGE: (u64, u64) = (0, 5_000);
    pub const SYNC_TIMEOUT_RANGE: (u64, u64) = (1_000, 30_000);
    pub const MAX_CONCURRENT_RANGE: (u64, u64) = (1, 20);

    /// Parse and validate a JSON config block.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every option against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("debounceMs", self.debounce_ms, Self::DEBOUNCE_RANGE)?;
        check_range("syncTimeout", self.sync_timeout, Self::SYNC_TIMEOUT_RANGE)?;
        check_range(
            "maxConcurrentReloads",
            self.max_concurrent_reloads as u64,
            Self::MAX_CONCURRENT_RANGE,
        )?;
        check_range("reloadTimeout", self.reload_timeout, (1, u64::MAX))?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        if self.batch_updates {
            Duration::from_millis(self.debounce_ms)
        } else {
            Duration::ZERO
        }
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_millis(self.reload_timeout)
    }

    pub fn is_strict(&self) -> bool {
        self.error_recovery_mode == ErrorRecoveryMode::Strict
    }
}

fn check_range(field: &'static str, value: u64, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReloadConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.error_recovery_mode, ErrorRecoveryMode::Graceful);
        assert_eq!(config.max_concurrent_reloads, 3);
    }

    #[test]
    fn parses_camel_case_json() {
        let config = ReloadConfig::from_json(
            r#"{
                "debounceMs": 250,
                "maxConcurrentReloads": 5,
                "errorRecoveryMode": "strict",
                "somethingElse": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.max_concurrent_reloads, 5);
        assert!(config.is_strict());
        // Unspecified options keep their defaults.
        assert!(config.preserve_state);
        assert_eq!(config.sync_timeout, 5_000);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = ReloadConfig::from_json(r#"{ "syncTimeout": 500 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "syncTimeout",
                ..
            }
        ));

        let config = ReloadConfig {
            max_concurrent_reloads: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ReloadConfig {
            debounce_ms: 5_001,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabling_batching_removes_debounce() {
        let config = ReloadConfig {
            batch_updates: false,
            debounce_ms: 300,
            ..Default::default()
        };
        assert_eq!(config.debounce(), Duration::ZERO);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            ReloadConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
