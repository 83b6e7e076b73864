//! Gateway call and response envelopes.

use rust_decimal::Decimal;

use crate::application::ports::{OrderSnapshot, SubmitOrderRequest, Ticker};
use crate::domain::shared::{ExternalOrderId, InstrumentId};

/// One brokerage method invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// Submit an order.
    SubmitOrder(SubmitOrderRequest),
    /// Fetch order state.
    GetOrder(ExternalOrderId),
    /// Fetch an asset balance.
    GetBalance(String),
    /// Fetch the last price.
    GetTicker(InstrumentId),
}

impl GatewayCall {
    /// Method name for logs, metrics and cache keys.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::SubmitOrder(_) => "submit_order",
            Self::GetOrder(_) => "get_order",
            Self::GetBalance(_) => "get_balance",
            Self::GetTicker(_) => "get_ticker",
        }
    }

    /// Cache key `(method, args)`; `None` for calls that must never be cached.
    #[must_use]
    pub fn cache_key(&self) -> Option<String> {
        let arg = match self {
            Self::SubmitOrder(_) => return None,
            Self::GetOrder(id) => id.as_str(),
            Self::GetBalance(asset) => asset.as_str(),
            Self::GetTicker(instrument) => instrument.as_str(),
        };
        Some(format!("{}:{arg}", self.method()))
    }
}

/// Result of a [`GatewayCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    /// From `SubmitOrder` or `GetOrder`.
    Order(OrderSnapshot),
    /// From `GetBalance`.
    Balance(Decimal),
    /// From `GetTicker`.
    Ticker(Ticker),
}

impl GatewayResponse {
    /// Orders are cached only once terminal; reads always.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        match self {
            Self::Order(snapshot) => snapshot.state.is_terminal(),
            Self::Balance(_) | Self::Ticker(_) => true,
        }
    }
}
