//! Broker Port (Driven Port)
//!
//! Raw, single-attempt access to the brokerage. Never called directly by
//! use cases: every call goes through an [`ExchangeGateway`](super::ExchangeGateway)
//! which adds rate budgeting, caching, retries and timeouts.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{ExternalOrderId, InstrumentId, Money, Timestamp, TradeId};
use crate::domain::trade_execution::{OrderSide, RemoteOrderState};

/// Notional market order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Client order id; the trade id, so resubmission is idempotent.
    pub client_order_id: TradeId,
    /// Instrument.
    pub instrument: InstrumentId,
    /// Direction.
    pub side: OrderSide,
    /// Quote-currency notional.
    pub notional: Money,
}

/// Brokerage view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Brokerage-assigned order id.
    pub external_order_id: ExternalOrderId,
    /// Client order id echoed back.
    pub client_order_id: TradeId,
    /// Current remote state.
    pub state: RemoteOrderState,
    /// Base units filled so far.
    pub filled_units: Decimal,
    /// Average fill price, once anything filled.
    pub average_fill_price: Option<Decimal>,
    /// Fees charged so far.
    pub fees: Money,
}

/// Last traded price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    /// Instrument.
    pub instrument: InstrumentId,
    /// Last price.
    pub price: Decimal,
    /// When the brokerage observed it.
    pub at: Timestamp,
}

/// Broker port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Connection error.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Request timed out.
    #[error("Broker request timed out")]
    Timeout,

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The missing order id.
        order_id: String,
    },

    /// HTTP 429 or equivalent.
    #[error("Rate limited by broker")]
    RateLimited {
        /// Server-suggested wait, if any.
        retry_after: Option<Duration>,
    },

    /// The response could not be understood.
    #[error("Invalid broker response: {message}")]
    InvalidResponse {
        /// Error details.
        message: String,
    },

    /// Credentials missing or refused.
    #[error("Broker authentication failed")]
    AuthenticationFailed,

    /// Unknown error.
    #[error("Broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl BrokerError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError { .. } | Self::Timeout | Self::RateLimited { .. }
        )
    }
}

/// Port for brokerage interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Submit a notional market order.
    async fn submit_order(&self, request: SubmitOrderRequest)
    -> Result<OrderSnapshot, BrokerError>;

    /// Current state of an order.
    async fn get_order(&self, order_id: &ExternalOrderId) -> Result<OrderSnapshot, BrokerError>;

    /// Available balance of an asset (e.g. `USD`, `ETH`).
    async fn get_balance(&self, asset: &str) -> Result<Decimal, BrokerError>;

    /// Last price of an instrument.
    async fn get_ticker(&self, instrument: &InstrumentId) -> Result<Ticker, BrokerError>;
}
