//! Rate-limited gateway to the brokerage.
//!
//! The only component allowed to call a [`BrokerPort`](crate::application::ports::BrokerPort).
//! All mutable state (rolling budget, cooldown, cache, waiting queue) sits
//! behind one mutex that is never held across an await.

mod budget;
mod cache;
mod call;
mod queue;
mod rate_limited;
mod retry;

use std::time::Duration;

pub use call::{GatewayCall, GatewayResponse};
pub use rate_limited::{GatewayStats, RateLimitedGateway};
pub use retry::{ExponentialBackoffCalculator, RetryPolicy, is_retryable_status};

/// Tunables for [`RateLimitedGateway`].
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    /// Calls allowed in any trailing window.
    pub calls_per_window: u32,
    /// Length of the rolling window.
    pub window: Duration,
    /// How long read responses stay cached.
    pub cache_ttl: Duration,
    /// Minimum pause for non-critical calls after a remote 429.
    pub rate_limit_cooldown: Duration,
    /// Hard timeout per remote attempt.
    pub call_timeout: Duration,
    /// Backoff for transient failures.
    pub retry: RetryPolicy,
    /// Sleep between budget checks for CRITICAL calls.
    pub critical_poll_interval: Duration,
    /// Budget checks a CRITICAL call makes before giving up.
    pub critical_max_polls: u32,
    /// Longest a queued non-critical call waits for budget; `None` waits indefinitely.
    pub max_queue_wait: Option<Duration>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            calls_per_window: 8,
            window: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(15),
            rate_limit_cooldown: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            critical_poll_interval: Duration::from_millis(250),
            critical_max_polls: 40,
            max_queue_wait: Some(Duration::from_secs(90)),
        }
    }
}
