//! Execution coordinator and worker pool settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::use_cases::ExecutionSettings;
use crate::domain::position_ledger::SizingParameters;

/// Execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Instrument lock TTL in seconds.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    /// Status checks right after submission.
    #[serde(default = "default_immediate_poll_attempts")]
    pub immediate_poll_attempts: u32,
    /// Delay before each status check, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Concurrent executions.
    #[serde(default = "default_workers")]
    pub workers: u32,
    /// Tranche sizing multipliers.
    #[serde(default)]
    pub sizing: SizingParameters,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: default_lock_ttl_secs(),
            immediate_poll_attempts: default_immediate_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            workers: default_workers(),
            sizing: SizingParameters::default(),
        }
    }
}

impl ExecutionConfig {
    /// Coordinator settings.
    #[must_use]
    pub const fn to_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            lock_ttl: Duration::from_secs(self.lock_ttl_secs),
            immediate_poll_attempts: self.immediate_poll_attempts,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

const fn default_lock_ttl_secs() -> u64 {
    30
}

const fn default_immediate_poll_attempts() -> u32 {
    3
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_workers() -> u32 {
    4
}
