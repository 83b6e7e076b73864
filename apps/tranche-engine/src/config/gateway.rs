//! Rate-limited gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::gateway::{GatewaySettings, RetryPolicy};

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Brokerage calls allowed per rolling minute.
    #[serde(default = "default_calls_per_minute")]
    pub calls_per_minute: u32,
    /// Read cache TTL in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Pause after a remote 429, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Backoff growth factor.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Jitter as a fraction of the backoff.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
    /// Sleep between budget checks for CRITICAL calls, in milliseconds.
    #[serde(default = "default_critical_poll_ms")]
    pub critical_poll_interval_ms: u64,
    /// Budget checks before a CRITICAL call gives up.
    #[serde(default = "default_critical_max_polls")]
    pub critical_max_polls: u32,
    /// Longest a queued call waits for budget, in seconds. `null` waits forever.
    #[serde(default = "default_max_queue_wait_secs")]
    pub max_queue_wait_secs: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            calls_per_minute: default_calls_per_minute(),
            cache_ttl_secs: default_cache_ttl_secs(),
            rate_limit_cooldown_secs: default_cooldown_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
            critical_poll_interval_ms: default_critical_poll_ms(),
            critical_max_polls: default_critical_max_polls(),
            max_queue_wait_secs: default_max_queue_wait_secs(),
        }
    }
}

impl GatewayConfig {
    /// Runtime settings for [`RateLimitedGateway`](crate::infrastructure::gateway::RateLimitedGateway).
    #[must_use]
    pub fn to_settings(&self) -> GatewaySettings {
        GatewaySettings {
            calls_per_window: self.calls_per_minute,
            window: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            rate_limit_cooldown: Duration::from_secs(self.rate_limit_cooldown_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                backoff_multiplier: self.backoff_multiplier,
                jitter_factor: self.jitter_factor,
            },
            critical_poll_interval: Duration::from_millis(self.critical_poll_interval_ms),
            critical_max_polls: self.critical_max_polls,
            max_queue_wait: self.max_queue_wait_secs.map(Duration::from_secs),
        }
    }
}

const fn default_calls_per_minute() -> u32 {
    8
}

const fn default_cache_ttl_secs() -> u64 {
    15
}

const fn default_cooldown_secs() -> u64 {
    5
}

const fn default_call_timeout_secs() -> u64 {
    10
}

const fn default_max_retries() -> u32 {
    4
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_jitter_factor() -> f64 {
    0.2
}

const fn default_critical_poll_ms() -> u64 {
    250
}

const fn default_critical_max_polls() -> u32 {
    40
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_queue_wait_secs() -> Option<u64> {
    Some(90)
}
