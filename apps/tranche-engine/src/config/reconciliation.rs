//! Reconciliation loop settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Run the background loop.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl ReconciliationConfig {
    /// Pass interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_interval_secs() -> u64 {
    30
}
