//! Trade Aggregate Root
//!
//! One order attempt against the brokerage. Created `Pending` before the
//! order is submitted so that a crash between save and submit leaves a
//! trade without an external order id, which reconciliation fails.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{ExternalOrderId, InstrumentId, LotId, Money, Timestamp, TradeId};
use crate::domain::trade_execution::errors::TradeError;
use crate::domain::trade_execution::value_objects::{OrderSide, Temperature, TradeStatus};

/// Parameters for a new trade.
#[derive(Debug, Clone)]
pub struct NewTrade {
    /// Instrument.
    pub instrument: InstrumentId,
    /// Direction.
    pub side: OrderSide,
    /// Notional to submit.
    pub requested_notional: Money,
    /// Ticker price the order was sized against.
    pub reference_price: Decimal,
    /// Decision confidence.
    pub confidence: f64,
    /// Decision temperature.
    pub temperature: Temperature,
}

/// Execution details of a completed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Average fill price.
    pub price: Decimal,
    /// Base units filled.
    pub units: Decimal,
    /// Fees charged, in quote currency.
    pub fees: Money,
}

impl Fill {
    /// Quote-currency value of the fill.
    #[must_use]
    pub fn notional(&self) -> Money {
        Money::new(self.price * self.units)
    }
}

/// Trade aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    id: TradeId,
    instrument: InstrumentId,
    side: OrderSide,
    requested_notional: Money,
    reference_price: Decimal,
    confidence: f64,
    temperature: Temperature,
    status: TradeStatus,
    external_order_id: Option<ExternalOrderId>,
    fill: Option<Fill>,
    realized_pnl: Option<Money>,
    tranche_ref: Option<LotId>,
    failure_reason: Option<String>,
    created_at: Timestamp,
    filled_at: Option<Timestamp>,
    updated_at: Timestamp,
}

impl Trade {
    /// Create a pending trade with a fresh id.
    #[must_use]
    pub fn pending(params: NewTrade, at: Timestamp) -> Self {
        Self::pending_with_id(TradeId::generate(), params, at)
    }

    /// Create a pending trade with a caller-supplied id.
    #[must_use]
    pub fn pending_with_id(id: TradeId, params: NewTrade, at: Timestamp) -> Self {
        Self {
            id,
            instrument: params.instrument,
            side: params.side,
            requested_notional: params.requested_notional,
            reference_price: params.reference_price,
            confidence: params.confidence,
            temperature: params.temperature,
            status: TradeStatus::Pending,
            external_order_id: None,
            fill: None,
            realized_pnl: None,
            tranche_ref: None,
            failure_reason: None,
            created_at: at,
            filled_at: None,
            updated_at: at,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Trade id (also the client order id).
    #[must_use]
    pub const fn id(&self) -> &TradeId {
        &self.id
    }

    /// Instrument.
    #[must_use]
    pub const fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Direction.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }

    /// Notional requested at submission.
    #[must_use]
    pub const fn requested_notional(&self) -> Money {
        self.requested_notional
    }

    /// Ticker price at submission.
    #[must_use]
    pub const fn reference_price(&self) -> Decimal {
        self.reference_price
    }

    /// Decision confidence.
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Decision temperature.
    #[must_use]
    pub const fn temperature(&self) -> Temperature {
        self.temperature
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> TradeStatus {
        self.status
    }

    /// Brokerage order id, once submitted.
    #[must_use]
    pub const fn external_order_id(&self) -> Option<&ExternalOrderId> {
        self.external_order_id.as_ref()
    }

    /// Fill details, once completed.
    #[must_use]
    pub const fn fill(&self) -> Option<&Fill> {
        self.fill.as_ref()
    }

    /// Average fill price, once completed.
    #[must_use]
    pub fn filled_price(&self) -> Option<Decimal> {
        self.fill.map(|f| f.price)
    }

    /// Fees charged, zero until completed.
    #[must_use]
    pub fn fees(&self) -> Money {
        self.fill.map_or(Money::ZERO, |f| f.fees)
    }

    /// P&L booked against the ledger by a SELL fill.
    #[must_use]
    pub const fn realized_pnl(&self) -> Option<Money> {
        self.realized_pnl
    }

    /// Realized P&L net of fees; `None` unless a SELL fill booked P&L.
    #[must_use]
    pub fn net_pnl(&self) -> Option<Money> {
        self.realized_pnl.map(|pnl| pnl - self.fees())
    }

    /// Tranche opened by a BUY fill.
    #[must_use]
    pub const fn tranche_ref(&self) -> Option<&LotId> {
        self.tranche_ref.as_ref()
    }

    /// Why the trade failed.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Fill time; only set on transition to `Completed`.
    #[must_use]
    pub const fn filled_at(&self) -> Option<Timestamp> {
        self.filled_at
    }

    /// Last mutation time.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Time of the last market-relevant activity: fill time, else creation.
    #[must_use]
    pub fn activity_at(&self) -> Timestamp {
        self.filled_at.unwrap_or(self.created_at)
    }

    /// Best known execution price: fill price, else reference price.
    #[must_use]
    pub fn last_price(&self) -> Decimal {
        self.filled_price().unwrap_or(self.reference_price)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Link the brokerage order id returned by submission.
    ///
    /// # Errors
    ///
    /// Returns `TradeError::ExternalIdMismatch` if a different id is already linked.
    pub fn attach_external_order(
        &mut self,
        external_id: ExternalOrderId,
        at: Timestamp,
    ) -> Result<(), TradeError> {
        match &self.external_order_id {
            Some(existing) if *existing != external_id => Err(TradeError::ExternalIdMismatch {
                existing: existing.to_string(),
                offered: external_id.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.external_order_id = Some(external_id);
                self.updated_at = at;
                Ok(())
            }
        }
    }

    /// Transition `Pending -> Completed`.
    ///
    /// Returns `Ok(false)` when already completed (idempotent re-apply).
    ///
    /// # Errors
    ///
    /// Returns `TradeError::InvalidStateTransition` from `Failed`, or
    /// `TradeError::InvalidFill` for a non-positive price or negative units.
    pub fn complete(&mut self, fill: Fill, at: Timestamp) -> Result<bool, TradeError> {
        match self.status {
            TradeStatus::Completed => return Ok(false),
            TradeStatus::Failed => {
                return Err(TradeError::InvalidStateTransition {
                    from: self.status,
                    to: TradeStatus::Completed,
                });
            }
            TradeStatus::Pending => {}
        }
        if fill.price <= Decimal::ZERO {
            return Err(TradeError::InvalidFill {
                message: format!("non-positive fill price {}", fill.price),
            });
        }
        if fill.units.is_sign_negative() {
            return Err(TradeError::InvalidFill {
                message: format!("negative filled units {}", fill.units),
            });
        }
        self.status = TradeStatus::Completed;
        self.fill = Some(fill);
        self.filled_at = Some(at);
        self.updated_at = at;
        Ok(true)
    }

    /// Transition `Pending -> Failed`.
    ///
    /// Returns `Ok(false)` when already failed (idempotent re-apply).
    ///
    /// # Errors
    ///
    /// Returns `TradeError::InvalidStateTransition` from `Completed`.
    pub fn fail(&mut self, reason: impl Into<String>, at: Timestamp) -> Result<bool, TradeError> {
        match self.status {
            TradeStatus::Failed => Ok(false),
            TradeStatus::Completed => Err(TradeError::InvalidStateTransition {
                from: self.status,
                to: TradeStatus::Failed,
            }),
            TradeStatus::Pending => {
                self.status = TradeStatus::Failed;
                self.failure_reason = Some(reason.into());
                self.updated_at = at;
                Ok(true)
            }
        }
    }

    /// Record the tranche a BUY fill opened.
    pub fn record_tranche(&mut self, lot_id: LotId) {
        self.tranche_ref = Some(lot_id);
    }

    /// Record the P&L a SELL fill booked.
    pub fn record_realized_pnl(&mut self, pnl: Money) {
        self.realized_pnl = Some(pnl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn new_trade(side: OrderSide) -> Trade {
        Trade::pending(
            NewTrade {
                instrument: InstrumentId::new("BTC-USD"),
                side,
                requested_notional: Money::new(dec!(100)),
                reference_price: dec!(50),
                confidence: 0.6,
                temperature: Temperature::Warm,
            },
            ts("2026-03-01T10:00:00Z"),
        )
    }

    fn fill() -> Fill {
        Fill {
            price: dec!(50),
            units: dec!(2),
            fees: Money::new(dec!(0.1)),
        }
    }

    #[test]
    fn new_trade_is_pending_without_fill_time() {
        let trade = new_trade(OrderSide::Buy);
        assert_eq!(trade.status(), TradeStatus::Pending);
        assert!(trade.filled_at().is_none());
        assert!(trade.external_order_id().is_none());
        assert_eq!(trade.last_price(), dec!(50));
        assert_eq!(trade.activity_at(), trade.created_at());
    }

    #[test]
    fn complete_sets_fill_time_once() {
        let mut trade = new_trade(OrderSide::Buy);
        let at = ts("2026-03-01T10:00:05Z");
        assert!(trade.complete(fill(), at).unwrap());
        assert_eq!(trade.status(), TradeStatus::Completed);
        assert_eq!(trade.filled_at(), Some(at));
        assert_eq!(trade.fill().unwrap().notional(), Money::new(dec!(100)));

        // Re-applying is a no-op and keeps the original fill time.
        let later = ts("2026-03-01T11:00:00Z");
        assert!(!trade.complete(fill(), later).unwrap());
        assert_eq!(trade.filled_at(), Some(at));
    }

    #[test]
    fn fail_does_not_set_fill_time() {
        let mut trade = new_trade(OrderSide::Buy);
        assert!(trade.fail("rejected", ts("2026-03-01T10:00:05Z")).unwrap());
        assert_eq!(trade.status(), TradeStatus::Failed);
        assert_eq!(trade.failure_reason(), Some("rejected"));
        assert!(trade.filled_at().is_none());
    }

    #[test]
    fn terminal_states_do_not_cross() {
        let mut completed = new_trade(OrderSide::Buy);
        completed.complete(fill(), ts("2026-03-01T10:00:05Z")).unwrap();
        assert!(completed.fail("late cancel", ts("2026-03-01T10:01:00Z")).is_err());

        let mut failed = new_trade(OrderSide::Buy);
        failed.fail("cancelled", ts("2026-03-01T10:00:05Z")).unwrap();
        assert!(failed.complete(fill(), ts("2026-03-01T10:01:00Z")).is_err());
    }

    #[test]
    fn rejects_zero_fill_price() {
        let mut trade = new_trade(OrderSide::Buy);
        let bad = Fill {
            price: Decimal::ZERO,
            ..fill()
        };
        assert!(matches!(
            trade.complete(bad, ts("2026-03-01T10:00:05Z")),
            Err(TradeError::InvalidFill { .. })
        ));
        assert_eq!(trade.status(), TradeStatus::Pending);
    }

    #[test]
    fn external_id_attaches_once() {
        let mut trade = new_trade(OrderSide::Sell);
        let at = ts("2026-03-01T10:00:01Z");
        trade.attach_external_order(ExternalOrderId::new("x-1"), at).unwrap();
        trade.attach_external_order(ExternalOrderId::new("x-1"), at).unwrap();
        assert!(trade
            .attach_external_order(ExternalOrderId::new("x-2"), at)
            .is_err());
    }

    #[test]
    fn net_pnl_subtracts_fees() {
        let mut trade = new_trade(OrderSide::Sell);
        trade.complete(fill(), ts("2026-03-01T10:00:05Z")).unwrap();
        assert!(trade.net_pnl().is_none());
        trade.record_realized_pnl(Money::new(dec!(-5)));
        assert_eq!(trade.net_pnl(), Some(Money::new(dec!(-5.1))));
    }
}
