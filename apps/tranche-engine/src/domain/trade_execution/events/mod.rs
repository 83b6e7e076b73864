//! Domain events for the trade lifecycle.
//!
//! Emitted for external observers; transport is an adapter concern.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{BlockKind, OrderSide};
use crate::domain::shared::{ExternalOrderId, InstrumentId, LotId, Money, Timestamp, TradeId};

/// All trade lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeEvent {
    /// Order accepted by the brokerage.
    Submitted(TradeSubmitted),
    /// Order filled and applied to the ledger.
    Filled(TradeFilled),
    /// Trade failed (never submitted, cancelled or rejected).
    Failed(TradeFailed),
    /// Execution blocked before submission.
    Blocked(TradeBlocked),
}

impl TradeEvent {
    /// Instrument the event concerns.
    #[must_use]
    pub const fn instrument(&self) -> &InstrumentId {
        match self {
            Self::Submitted(e) => &e.instrument,
            Self::Filled(e) => &e.instrument,
            Self::Failed(e) => &e.instrument,
            Self::Blocked(e) => &e.instrument,
        }
    }

    /// When the event occurred.
    #[must_use]
    pub const fn occurred_at(&self) -> Timestamp {
        match self {
            Self::Submitted(e) => e.occurred_at,
            Self::Filled(e) => e.occurred_at,
            Self::Failed(e) => e.occurred_at,
            Self::Blocked(e) => e.occurred_at,
        }
    }

    /// Event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Submitted(_) => "TRADE_SUBMITTED",
            Self::Filled(_) => "TRADE_FILLED",
            Self::Failed(_) => "TRADE_FAILED",
            Self::Blocked(_) => "TRADE_BLOCKED",
        }
    }
}

/// Order accepted by the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSubmitted {
    /// Trade id.
    pub trade_id: TradeId,
    /// Brokerage order id.
    pub external_order_id: ExternalOrderId,
    /// Instrument.
    pub instrument: InstrumentId,
    /// Direction.
    pub side: OrderSide,
    /// Notional submitted.
    pub notional: Money,
    /// Event time.
    pub occurred_at: Timestamp,
}

/// Order filled and applied to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFilled {
    /// Trade id.
    pub trade_id: TradeId,
    /// Instrument.
    pub instrument: InstrumentId,
    /// Direction.
    pub side: OrderSide,
    /// Average fill price.
    pub price: Decimal,
    /// Base units filled.
    pub units: Decimal,
    /// Tranche opened (BUY).
    pub tranche_ref: Option<LotId>,
    /// P&L booked (SELL).
    pub realized_pnl: Option<Money>,
    /// Event time.
    pub occurred_at: Timestamp,
}

/// Trade failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFailed {
    /// Trade id.
    pub trade_id: TradeId,
    /// Instrument.
    pub instrument: InstrumentId,
    /// Why.
    pub reason: String,
    /// Event time.
    pub occurred_at: Timestamp,
}

/// Execution blocked before any trade was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeBlocked {
    /// Instrument.
    pub instrument: InstrumentId,
    /// Direction.
    pub side: OrderSide,
    /// Category.
    pub kind: BlockKind,
    /// Every failing check.
    pub reasons: Vec<String>,
    /// Event time.
    pub occurred_at: Timestamp,
}
