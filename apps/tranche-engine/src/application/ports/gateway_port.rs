//! Exchange Gateway Port
//!
//! The single path to the brokerage for use cases. Implementations enforce
//! the per-minute call budget, serve recent reads from cache, order queued
//! calls by priority, and retry transient failures.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::broker_port::{BrokerError, OrderSnapshot, SubmitOrderRequest, Ticker};
use crate::domain::shared::{ExternalOrderId, InstrumentId};

/// Scheduling priority of a gateway call.
///
/// Ordering is `Low < Medium < High < Critical`. `Critical` calls never
/// wait behind queued work and ignore the rate-limit cooldown.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallPriority {
    /// Background work.
    Low,
    /// Routine reads.
    #[default]
    Medium,
    /// Reads on the execution path.
    High,
    /// Order submission.
    Critical,
}

impl CallPriority {
    /// Lowercase label for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for CallPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Gateway error after budgeting and retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The budget stayed exhausted past the call's wait limit.
    #[error("Rate limited: budget exhausted after waiting {waited:?}")]
    RateLimited {
        /// How long the call waited for a slot.
        waited: Duration,
    },

    /// One attempt exceeded the per-call timeout.
    #[error("Gateway call timed out after {timeout:?}")]
    Timeout {
        /// Configured per-call timeout.
        timeout: Duration,
    },

    /// Permanent brokerage error (not retried).
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Transient errors persisted through every retry.
    #[error("Gateway gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        last_error: String,
    },

    /// The gateway is shutting down.
    #[error("Gateway closed")]
    Closed,
}

/// Port for rate-limited brokerage access.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Submit an order. Never cached.
    async fn submit_order(
        &self,
        request: SubmitOrderRequest,
        priority: CallPriority,
    ) -> Result<OrderSnapshot, GatewayError>;

    /// Order status. Terminal states may be served from cache.
    async fn get_order(
        &self,
        order_id: &ExternalOrderId,
        priority: CallPriority,
    ) -> Result<OrderSnapshot, GatewayError>;

    /// Asset balance. May be served from cache.
    async fn get_balance(&self, asset: &str, priority: CallPriority)
    -> Result<Decimal, GatewayError>;

    /// Last price. May be served from cache.
    async fn get_ticker(
        &self,
        instrument: &InstrumentId,
        priority: CallPriority,
    ) -> Result<Ticker, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(CallPriority::Low < CallPriority::Medium);
        assert!(CallPriority::Medium < CallPriority::High);
        assert!(CallPriority::High < CallPriority::Critical);
        assert_eq!(CallPriority::default(), CallPriority::Medium);
    }

    #[test]
    fn broker_error_converts() {
        let err: GatewayError = BrokerError::AuthenticationFailed.into();
        assert_eq!(err, GatewayError::Broker(BrokerError::AuthenticationFailed));
        assert_eq!(err.to_string(), "Broker authentication failed");
    }
}
