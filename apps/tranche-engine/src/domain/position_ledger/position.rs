//! Position Aggregate Root
//!
//! All open tranches for one instrument sharing one weighted average cost.
//!
//! Invariants:
//! - `total_notional == Σ tranche.notional`
//! - `average_cost == Σ(price·notional) / Σ notional`
//! - status is `Closed` iff there are no tranches
//! - tranche count never exceeds `max_tranches`

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use super::errors::LedgerError;
use super::tranche::Tranche;
use crate::domain::shared::{InstrumentId, LotId, Money, Timestamp, TradeId};

/// Settlements remembered per position.
const SETTLEMENT_MEMORY: usize = 64;

/// Lifecycle of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// No tranches.
    Closed,
    /// Exactly one tranche after an entry.
    Building,
    /// Two or more tranches after an entry.
    Open,
    /// Partially exited, at least one tranche left.
    Reducing,
}

impl PositionStatus {
    /// Returns true unless closed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "CLOSED",
            Self::Building => "BUILDING",
            Self::Open => "OPEN",
            Self::Reducing => "REDUCING",
        };
        f.write_str(s)
    }
}

/// Effect of adding a tranche on the average cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcaImpact {
    /// Average cost before the add (zero when flat).
    pub old_avg: Decimal,
    /// Average cost after the add.
    pub new_avg: Decimal,
    /// `(old_avg - new_avg) / old_avg * 100`; zero when flat.
    pub improvement_pct: Decimal,
}

impl DcaImpact {
    /// Returns true if the add lowers the average cost.
    #[must_use]
    pub fn lowers_cost(&self) -> bool {
        self.improvement_pct > Decimal::ZERO
    }
}

/// One tranche's share of an exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitAllocation {
    /// Lot consumed.
    pub lot_id: LotId,
    /// Lot entry price.
    pub entry_price: Decimal,
    /// Cost-basis notional consumed.
    pub consumed_notional: Money,
    /// Base units consumed.
    pub consumed_units: Decimal,
    /// `(exit - entry) * consumed_notional / entry`.
    pub realized_pnl: Money,
    /// Whether the lot was removed entirely.
    pub fully_consumed: bool,
}

/// Result of a partial or full exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitPlan {
    /// Instrument.
    pub instrument: InstrumentId,
    /// Fraction of held units exited, capped at 1.
    pub fraction: Decimal,
    /// Exit price.
    pub exit_price: Decimal,
    /// Per-lot allocations, oldest first.
    pub allocations: Vec<ExitAllocation>,
    /// Cost basis removed.
    pub consumed_notional: Money,
    /// Base units removed.
    pub consumed_units: Decimal,
    /// `consumed_units * exit_price`.
    pub proceeds: Money,
    /// Sum of allocation P&L.
    pub realized_pnl: Money,
    /// Status after the exit.
    pub resulting_status: PositionStatus,
    /// Tranches left after the exit.
    pub remaining_tranches: usize,
}

/// Ledger change booked for one filled trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledFill {
    /// Tranche opened by a BUY.
    pub tranche_ref: Option<LotId>,
    /// P&L booked by a SELL.
    pub realized_pnl: Option<Money>,
}

/// Position aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    instrument: InstrumentId,
    tranches: Vec<Tranche>,
    status: PositionStatus,
    max_tranches: u32,
    next_sequence: u32,
    realized_pnl: Money,
    updated_at: Option<Timestamp>,
    /// Most recent settlements, oldest first.
    #[serde(default)]
    settlements: VecDeque<(TradeId, SettledFill)>,
}

impl Position {
    /// A flat position.
    #[must_use]
    pub const fn new(instrument: InstrumentId, max_tranches: u32) -> Self {
        Self {
            instrument,
            tranches: Vec::new(),
            status: PositionStatus::Closed,
            max_tranches,
            next_sequence: 1,
            realized_pnl: Money::ZERO,
            updated_at: None,
            settlements: VecDeque::new(),
        }
    }

    /// Instrument.
    #[must_use]
    pub const fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Open tranches, oldest first.
    #[must_use]
    pub fn tranches(&self) -> &[Tranche] {
        &self.tranches
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> PositionStatus {
        self.status
    }

    /// Number of open tranches.
    #[must_use]
    pub fn tranche_count(&self) -> usize {
        self.tranches.len()
    }

    /// Whether the position holds nothing.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.tranches.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub const fn max_tranches(&self) -> u32 {
        self.max_tranches
    }

    /// Update the capacity (instrument config reloaded). Existing tranches are kept.
    pub const fn set_max_tranches(&mut self, max_tranches: u32) {
        self.max_tranches = max_tranches;
    }

    /// Whether another tranche may be added.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.tranches.len() < self.max_tranches as usize
    }

    /// Cumulative P&L booked by exits over the life of the position.
    #[must_use]
    pub const fn realized_pnl(&self) -> Money {
        self.realized_pnl
    }

    /// Last mutation time.
    #[must_use]
    pub const fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    /// Σ tranche notional.
    #[must_use]
    pub fn total_notional(&self) -> Money {
        self.tranches.iter().map(Tranche::notional).sum()
    }

    /// Σ tranche units.
    #[must_use]
    pub fn total_units(&self) -> Decimal {
        self.tranches.iter().map(Tranche::units).sum()
    }

    /// Notional-weighted average entry price; zero when flat.
    #[must_use]
    pub fn average_cost(&self) -> Decimal {
        let weighted: Decimal = self
            .tranches
            .iter()
            .map(|t| t.entry_price() * t.notional().amount())
            .sum();
        weighted
            .checked_div(self.total_notional().amount())
            .unwrap_or(Decimal::ZERO)
    }

    /// Value of all units at `price`.
    #[must_use]
    pub fn market_value(&self, price: Decimal) -> Money {
        Money::new(self.total_units() * price)
    }

    /// Append a tranche and re-derive the status.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidInput` for a non-positive price or notional
    /// and `LedgerError::CapacityExceeded` when the position is full.
    pub fn add_tranche(
        &mut self,
        price: Decimal,
        notional: Money,
        at: Timestamp,
    ) -> Result<LotId, LedgerError> {
        if price <= Decimal::ZERO {
            return Err(LedgerError::invalid("price", "must be positive"));
        }
        if !notional.is_positive() {
            return Err(LedgerError::invalid("notional", "must be positive"));
        }
        if !self.has_capacity() {
            return Err(LedgerError::CapacityExceeded {
                instrument: self.instrument.to_string(),
                max_tranches: self.max_tranches,
            });
        }

        let tranche = Tranche::new(price, notional, at, self.next_sequence);
        let lot_id = tranche.lot_id().clone();
        self.next_sequence += 1;
        self.tranches.push(tranche);
        self.status = if self.tranches.len() == 1 {
            PositionStatus::Building
        } else {
            PositionStatus::Open
        };
        self.updated_at = Some(at);
        Ok(lot_id)
    }

    /// Exit `fraction` of the held units at `exit_price`, oldest tranches first.
    ///
    /// The last tranche touched is split if only partly needed. A fraction of
    /// 1 or more liquidates everything and closes the position exactly.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::EmptyPosition` when flat and
    /// `LedgerError::InvalidInput` for a non-positive fraction or price.
    pub fn remove_partial(
        &mut self,
        fraction: Decimal,
        exit_price: Decimal,
        at: Timestamp,
    ) -> Result<ExitPlan, LedgerError> {
        if self.is_flat() {
            return Err(LedgerError::EmptyPosition {
                instrument: self.instrument.to_string(),
            });
        }
        if fraction <= Decimal::ZERO {
            return Err(LedgerError::invalid("fraction", "must be positive"));
        }
        if exit_price <= Decimal::ZERO {
            return Err(LedgerError::invalid("exit_price", "must be positive"));
        }

        let liquidate = fraction >= Decimal::ONE;
        let fraction = fraction.min(Decimal::ONE);
        let mut remaining_units = self.total_units() * fraction;
        let mut allocations = Vec::new();
        let mut consumed_lots = 0;

        for tranche in &mut self.tranches {
            if !liquidate && remaining_units <= Decimal::ZERO {
                break;
            }
            let units = tranche.units();
            let entry = tranche.entry_price();
            let (consumed_notional, consumed_units, fully_consumed) =
                if liquidate || remaining_units >= units {
                    consumed_lots += 1;
                    (tranche.notional(), units, true)
                } else {
                    let notional = Money::new(remaining_units * entry);
                    tranche.reduce(notional);
                    (notional, remaining_units, false)
                };
            remaining_units -= consumed_units;

            let realized_pnl = Money::new(
                ((exit_price - entry) * consumed_notional.amount())
                    .checked_div(entry)
                    .unwrap_or(Decimal::ZERO),
            );
            allocations.push(ExitAllocation {
                lot_id: tranche.lot_id().clone(),
                entry_price: entry,
                consumed_notional,
                consumed_units,
                realized_pnl,
                fully_consumed,
            });
        }
        self.tranches.drain(..consumed_lots);

        self.status = if self.tranches.is_empty() {
            PositionStatus::Closed
        } else {
            PositionStatus::Reducing
        };
        let realized_pnl: Money = allocations.iter().map(|a| a.realized_pnl).sum();
        let consumed_units: Decimal = allocations.iter().map(|a| a.consumed_units).sum();
        self.realized_pnl += realized_pnl;
        self.updated_at = Some(at);

        Ok(ExitPlan {
            instrument: self.instrument.clone(),
            fraction,
            exit_price,
            consumed_notional: allocations.iter().map(|a| a.consumed_notional).sum(),
            consumed_units,
            proceeds: Money::new(consumed_units * exit_price),
            realized_pnl,
            allocations,
            resulting_status: self.status,
            remaining_tranches: self.tranches.len(),
        })
    }

    /// What booking `trade_id` did to this position, if it has been booked.
    #[must_use]
    pub fn settled_fill(&self, trade_id: &TradeId) -> Option<&SettledFill> {
        self.settlements
            .iter()
            .find(|(id, _)| id == trade_id)
            .map(|(_, fill)| fill)
    }

    /// Remember that `trade_id` has been booked so it is never booked twice.
    pub fn mark_settled(&mut self, trade_id: TradeId, fill: SettledFill) {
        if self.settled_fill(&trade_id).is_some() {
            return;
        }
        if self.settlements.len() >= SETTLEMENT_MEMORY {
            self.settlements.pop_front();
        }
        self.settlements.push_back((trade_id, fill));
    }

    /// How adding `new_notional` at `new_price` would move the average cost.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidInput` for a non-positive price or notional.
    pub fn dca_impact(
        &self,
        new_price: Decimal,
        new_notional: Money,
    ) -> Result<DcaImpact, LedgerError> {
        if new_price <= Decimal::ZERO {
            return Err(LedgerError::invalid("new_price", "must be positive"));
        }
        if !new_notional.is_positive() {
            return Err(LedgerError::invalid("new_notional", "must be positive"));
        }
        if self.is_flat() {
            return Ok(DcaImpact {
                old_avg: Decimal::ZERO,
                new_avg: new_price,
                improvement_pct: Decimal::ZERO,
            });
        }

        let old_avg = self.average_cost();
        let old_notional = self.total_notional().amount();
        let new_notional = new_notional.amount();
        let new_avg = (old_avg * old_notional + new_price * new_notional)
            / (old_notional + new_notional);
        let improvement_pct = ((old_avg - new_avg) / old_avg) * Decimal::ONE_HUNDRED;

        Ok(DcaImpact {
            old_avg,
            new_avg,
            improvement_pct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts(minute: u32) -> Timestamp {
        Timestamp::parse(&format!("2026-03-01T10:{minute:02}:00Z")).unwrap()
    }

    fn position() -> Position {
        Position::new(InstrumentId::new("BTC-USD"), 3)
    }

    fn money(v: Decimal) -> Money {
        Money::new(v)
    }

    #[test]
    fn new_position_is_closed_and_flat() {
        let p = position();
        assert_eq!(p.status(), PositionStatus::Closed);
        assert!(p.is_flat());
        assert_eq!(p.average_cost(), Decimal::ZERO);
        assert_eq!(p.total_notional(), Money::ZERO);
    }

    #[test]
    fn status_follows_tranche_count() {
        let mut p = position();
        p.add_tranche(dec!(100), money(dec!(50)), ts(0)).unwrap();
        assert_eq!(p.status(), PositionStatus::Building);
        p.add_tranche(dec!(90), money(dec!(50)), ts(1)).unwrap();
        assert_eq!(p.status(), PositionStatus::Open);
    }

    #[test]
    fn average_cost_is_notional_weighted() {
        let mut p = position();
        p.add_tranche(dec!(100), money(dec!(300)), ts(0)).unwrap();
        p.add_tranche(dec!(80), money(dec!(100)), ts(1)).unwrap();
        // (100*300 + 80*100) / 400
        assert_eq!(p.average_cost(), dec!(95));
        assert_eq!(p.total_notional(), money(dec!(400)));
    }

    #[test]
    fn add_refuses_capacity_overflow() {
        let mut p = position();
        for minute in 0..3 {
            p.add_tranche(dec!(100), money(dec!(10)), ts(minute)).unwrap();
        }
        let err = p.add_tranche(dec!(100), money(dec!(10)), ts(5)).unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExceeded { max_tranches: 3, .. }));
        assert_eq!(p.tranche_count(), 3);
    }

    #[test]
    fn add_rejects_non_positive_inputs() {
        let mut p = position();
        assert!(p.add_tranche(Decimal::ZERO, money(dec!(10)), ts(0)).is_err());
        assert!(p.add_tranche(dec!(10), Money::ZERO, ts(0)).is_err());
        assert!(p.is_flat());
    }

    #[test]
    fn sequence_numbers_keep_increasing_after_exits() {
        let mut p = position();
        p.add_tranche(dec!(100), money(dec!(10)), ts(0)).unwrap();
        p.remove_partial(Decimal::ONE, dec!(100), ts(1)).unwrap();
        p.add_tranche(dec!(100), money(dec!(10)), ts(2)).unwrap();
        assert_eq!(p.tranches()[0].sequence_number(), 2);
    }

    #[test]
    fn remove_partial_consumes_fifo_and_splits_last() {
        let mut p = position();
        let first = p.add_tranche(dec!(100), money(dec!(100)), ts(0)).unwrap(); // 1 unit
        let second = p.add_tranche(dec!(50), money(dec!(100)), ts(1)).unwrap(); // 2 units

        // 3 units held; half = 1.5 units: all of the first lot, 0.5 of the second.
        let plan = p.remove_partial(dec!(0.5), dec!(120), ts(2)).unwrap();

        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].lot_id, first);
        assert!(plan.allocations[0].fully_consumed);
        assert_eq!(plan.allocations[0].realized_pnl, money(dec!(20)));
        assert_eq!(plan.allocations[1].lot_id, second);
        assert!(!plan.allocations[1].fully_consumed);
        assert_eq!(plan.allocations[1].consumed_units, dec!(0.5));
        assert_eq!(plan.allocations[1].consumed_notional, money(dec!(25)));
        // (120 - 50) * 25 / 50
        assert_eq!(plan.allocations[1].realized_pnl, money(dec!(35)));

        assert_eq!(plan.realized_pnl, money(dec!(55)));
        assert_eq!(plan.consumed_units, dec!(1.5));
        assert_eq!(plan.proceeds, money(dec!(180)));
        assert_eq!(plan.resulting_status, PositionStatus::Reducing);
        assert_eq!(p.status(), PositionStatus::Reducing);
        assert_eq!(p.tranche_count(), 1);
        assert_eq!(p.tranches()[0].notional(), money(dec!(75)));
        assert_eq!(p.realized_pnl(), money(dec!(55)));
    }

    #[test]
    fn remove_full_fraction_closes_exactly() {
        let mut p = position();
        p.add_tranche(dec!(3), money(dec!(10)), ts(0)).unwrap();
        p.add_tranche(dec!(7), money(dec!(10)), ts(1)).unwrap();
        let plan = p.remove_partial(Decimal::ONE, dec!(5), ts(2)).unwrap();
        assert_eq!(plan.resulting_status, PositionStatus::Closed);
        assert_eq!(plan.remaining_tranches, 0);
        assert_eq!(p.status(), PositionStatus::Closed);
        assert!(p.is_flat());
        assert_eq!(p.total_notional(), Money::ZERO);
    }

    #[test]
    fn fraction_above_one_is_capped() {
        let mut p = position();
        p.add_tranche(dec!(10), money(dec!(10)), ts(0)).unwrap();
        let plan = p.remove_partial(dec!(1.5), dec!(10), ts(1)).unwrap();
        assert_eq!(plan.fraction, Decimal::ONE);
        assert!(p.is_flat());
    }

    #[test]
    fn remove_rejects_bad_inputs() {
        let mut p = position();
        assert!(matches!(
            p.remove_partial(dec!(0.5), dec!(10), ts(0)),
            Err(LedgerError::EmptyPosition { .. })
        ));
        p.add_tranche(dec!(10), money(dec!(10)), ts(0)).unwrap();
        assert!(p.remove_partial(Decimal::ZERO, dec!(10), ts(1)).is_err());
        assert!(p.remove_partial(dec!(-0.1), dec!(10), ts(1)).is_err());
        assert!(p.remove_partial(dec!(0.5), Decimal::ZERO, ts(1)).is_err());
        assert_eq!(p.tranche_count(), 1);
    }

    #[test]
    fn add_after_reduce_rederives_status() {
        let mut p = position();
        p.add_tranche(dec!(10), money(dec!(10)), ts(0)).unwrap();
        p.add_tranche(dec!(10), money(dec!(10)), ts(1)).unwrap();
        p.remove_partial(dec!(0.5), dec!(10), ts(2)).unwrap();
        assert_eq!(p.status(), PositionStatus::Reducing);
        p.add_tranche(dec!(10), money(dec!(10)), ts(3)).unwrap();
        assert_eq!(p.status(), PositionStatus::Open);
    }

    #[test]
    fn dca_impact_matches_formula() {
        let mut p = position();
        p.add_tranche(dec!(100), money(dec!(100)), ts(0)).unwrap();
        let impact = p.dca_impact(dec!(80), money(dec!(100))).unwrap();
        assert_eq!(impact.old_avg, dec!(100));
        assert_eq!(impact.new_avg, dec!(90));
        assert_eq!(impact.improvement_pct, dec!(10));
        assert!(impact.lowers_cost());
    }

    #[test]
    fn dca_impact_on_flat_position() {
        let impact = position().dca_impact(dec!(42), money(dec!(10))).unwrap();
        assert_eq!(impact.old_avg, Decimal::ZERO);
        assert_eq!(impact.new_avg, dec!(42));
        assert_eq!(impact.improvement_pct, Decimal::ZERO);
    }

    #[test]
    fn dca_impact_buying_higher_is_negative() {
        let mut p = position();
        p.add_tranche(dec!(100), money(dec!(100)), ts(0)).unwrap();
        let impact = p.dca_impact(dec!(120), money(dec!(100))).unwrap();
        assert_eq!(impact.new_avg, dec!(110));
        assert!(!impact.lowers_cost());
    }

    #[test]
    fn settlements_are_remembered_once() {
        let mut p = position();
        let trade = TradeId::generate();
        let lot = p.add_tranche(dec!(100), money(dec!(100)), ts(0)).unwrap();
        let fill = SettledFill {
            tranche_ref: Some(lot),
            realized_pnl: None,
        };

        assert!(p.settled_fill(&trade).is_none());
        p.mark_settled(trade.clone(), fill.clone());
        p.mark_settled(
            trade.clone(),
            SettledFill {
                tranche_ref: None,
                realized_pnl: Some(money(dec!(1))),
            },
        );
        assert_eq!(p.settled_fill(&trade), Some(&fill));
    }

    #[test]
    fn settlement_memory_drops_oldest() {
        let mut p = position();
        let first = TradeId::generate();
        p.mark_settled(
            first.clone(),
            SettledFill {
                tranche_ref: None,
                realized_pnl: None,
            },
        );
        for _ in 0..SETTLEMENT_MEMORY {
            p.mark_settled(
                TradeId::generate(),
                SettledFill {
                    tranche_ref: None,
                    realized_pnl: None,
                },
            );
        }
        assert!(p.settled_fill(&first).is_none());
    }
}
