//! Wire types for the REST brokerage API.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{BrokerError, OrderSnapshot};
use crate::domain::shared::{ExternalOrderId, InstrumentId, Money, TradeId};
use crate::domain::trade_execution::RemoteOrderState;

/// Notional market order request.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Pair symbol, e.g. `ETH/USD`.
    pub symbol: String,
    /// Quote-currency notional.
    pub notional: String,
    /// `buy` or `sell`.
    pub side: &'static str,
    /// Always `market`.
    #[serde(rename = "type")]
    pub order_type: &'static str,
    /// Always `gtc` for crypto.
    pub time_in_force: &'static str,
    /// Idempotency key.
    pub client_order_id: String,
}

/// Order response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    /// Broker order id.
    pub id: String,
    /// Client order id.
    pub client_order_id: String,
    /// Order status.
    pub status: String,
    /// Filled quantity.
    #[serde(default)]
    pub filled_qty: Option<String>,
    /// Average fill price.
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    /// Commission charged, when reported.
    #[serde(default)]
    pub commission: Option<String>,
}

impl OrderResponse {
    /// Convert to an [`OrderSnapshot`].
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::InvalidResponse` for unparseable numbers.
    pub fn to_snapshot(&self) -> Result<OrderSnapshot, BrokerError> {
        Ok(OrderSnapshot {
            external_order_id: ExternalOrderId::new(&self.id),
            client_order_id: TradeId::new(&self.client_order_id),
            state: parse_order_state(&self.status),
            filled_units: parse_optional(self.filled_qty.as_deref(), "filled_qty")?
                .unwrap_or(Decimal::ZERO),
            average_fill_price: parse_optional(self.filled_avg_price.as_deref(), "filled_avg_price")?,
            fees: Money::new(
                parse_optional(self.commission.as_deref(), "commission")?.unwrap_or(Decimal::ZERO),
            ),
        })
    }
}

/// Account response (quote-currency cash).
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    /// Cash balance.
    pub cash: String,
}

/// Position response (base-asset holdings).
#[derive(Debug, Clone, Deserialize)]
pub struct PositionResponse {
    /// Quantity held.
    pub qty: String,
}

/// Latest trades response keyed by symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestTradesResponse {
    /// Trades by symbol.
    pub trades: HashMap<String, LatestTrade>,
}

/// One latest trade.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestTrade {
    /// Price.
    #[serde(rename = "p")]
    pub price: Decimal,
    /// RFC 3339 timestamp.
    #[serde(rename = "t")]
    pub time: String,
}

/// Error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error message.
    pub message: String,
}

/// `ETH-USD` → `ETH/USD`.
#[must_use]
pub fn pair_symbol(instrument: &InstrumentId) -> String {
    instrument.as_str().replace('-', "/")
}

/// Parse a brokerage status string.
#[must_use]
pub fn parse_order_state(status: &str) -> RemoteOrderState {
    match status.to_lowercase().as_str() {
        "new" | "accepted" | "pending_new" | "accepted_for_bidding" | "replaced"
        | "pending_replace" | "pending_cancel" => RemoteOrderState::Open,
        "partially_filled" => RemoteOrderState::PartiallyFilled,
        "filled" => RemoteOrderState::Filled,
        "settled" => RemoteOrderState::Settled,
        "canceled" | "cancelled" => RemoteOrderState::Cancelled,
        "rejected" => RemoteOrderState::Rejected,
        "expired" | "done_for_day" => RemoteOrderState::Expired,
        _ => RemoteOrderState::Unknown,
    }
}

fn parse_optional(value: Option<&str>, field: &str) -> Result<Option<Decimal>, BrokerError> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| BrokerError::InvalidResponse {
                message: format!("unparseable {field}: {raw}"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_filled_order() {
        let response: OrderResponse = serde_json::from_str(
            r#"{"id":"ord-1","client_order_id":"t-1","status":"filled",
                "filled_qty":"0.05","filled_avg_price":"2000.5"}"#,
        )
        .unwrap();
        let snapshot = response.to_snapshot().unwrap();
        assert_eq!(snapshot.state, RemoteOrderState::Filled);
        assert_eq!(snapshot.filled_units, dec!(0.05));
        assert_eq!(snapshot.average_fill_price, Some(dec!(2000.5)));
        assert_eq!(snapshot.fees, Money::ZERO);
    }

    #[test]
    fn garbage_number_is_invalid_response() {
        let response: OrderResponse = serde_json::from_str(
            r#"{"id":"ord-1","client_order_id":"t-1","status":"filled","filled_qty":"lots"}"#,
        )
        .unwrap();
        assert!(matches!(
            response.to_snapshot(),
            Err(BrokerError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(parse_order_state("pending_new"), RemoteOrderState::Open);
        assert_eq!(parse_order_state("canceled"), RemoteOrderState::Cancelled);
        assert_eq!(parse_order_state("done_for_day"), RemoteOrderState::Expired);
        assert_eq!(parse_order_state("held"), RemoteOrderState::Unknown);
    }

    #[test]
    fn pair_symbol_uses_slash() {
        assert_eq!(pair_symbol(&InstrumentId::new("ETH-USD")), "ETH/USD");
    }
}
