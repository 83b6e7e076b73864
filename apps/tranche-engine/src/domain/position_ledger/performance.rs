//! Position performance analysis.
//!
//! Concentration measures how far tranche weights drift from equal
//! weighting; efficiency measures whether more capital went into the
//! tranches that are doing best (i.e. were bought cheapest).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::errors::LedgerError;
use super::position::Position;
use crate::domain::shared::{InstrumentConfig, InstrumentId, LotId, Money};

/// Per-tranche performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranchePerformance {
    /// Lot.
    pub lot_id: LotId,
    /// Sequence number within the position.
    pub sequence_number: u32,
    /// Entry price.
    pub entry_price: Decimal,
    /// Cost-basis notional.
    pub notional: Money,
    /// Share of the position's notional.
    pub weight: f64,
    /// Return since entry, percent.
    pub return_pct: Decimal,
    /// Unrealized P&L.
    pub unrealized_pnl: Money,
}

/// Snapshot of a position's performance at a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Instrument.
    pub instrument: InstrumentId,
    /// Price the report was computed at.
    pub current_price: Decimal,
    /// Notional-weighted average entry.
    pub average_cost: Decimal,
    /// Cost basis.
    pub total_notional: Money,
    /// Value at `current_price`.
    pub market_value: Money,
    /// `market_value - total_notional`.
    pub unrealized_pnl: Money,
    /// Position return, percent of cost basis.
    pub total_return_pct: Decimal,
    /// 0 = equal weights, 1 = everything in one tranche.
    pub concentration_score: f64,
    /// 0.5 = neutral, above = more capital in better-performing tranches.
    pub efficiency_score: f64,
    /// Per-tranche detail, oldest first.
    pub tranches: Vec<TranchePerformance>,
}

/// Which advisory exit threshold the price has crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitTrigger {
    /// Price at or below the stop.
    StopLoss,
    /// Price at or above the target.
    TakeProfit,
}

/// Stop/target levels for a position and whether either has been hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCheck {
    /// `average_cost * (1 - stop_loss_pct / 100)`.
    pub stop_price: Decimal,
    /// `average_cost * (1 + take_profit_pct / 100)`.
    pub target_price: Decimal,
    /// Threshold crossed, if any.
    pub trigger: Option<ExitTrigger>,
}

impl Position {
    /// Analyze the position at `current_price`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::EmptyPosition` when flat and
    /// `LedgerError::InvalidInput` for a non-positive price.
    pub fn analyze_performance(
        &self,
        current_price: Decimal,
    ) -> Result<PerformanceReport, LedgerError> {
        if self.is_flat() {
            return Err(LedgerError::EmptyPosition {
                instrument: self.instrument().to_string(),
            });
        }
        if current_price <= Decimal::ZERO {
            return Err(LedgerError::invalid("current_price", "must be positive"));
        }

        let total_notional = self.total_notional();
        let tranches: Vec<TranchePerformance> = self
            .tranches()
            .iter()
            .map(|t| TranchePerformance {
                lot_id: t.lot_id().clone(),
                sequence_number: t.sequence_number(),
                entry_price: t.entry_price(),
                notional: t.notional(),
                weight: t
                    .notional()
                    .ratio(total_notional)
                    .and_then(|w| w.to_f64())
                    .unwrap_or(0.0),
                return_pct: t.return_pct(current_price),
                unrealized_pnl: t.unrealized_pnl(current_price),
            })
            .collect();

        let market_value = self.market_value(current_price);
        let unrealized_pnl = market_value - total_notional;
        let total_return_pct = unrealized_pnl
            .ratio(total_notional)
            .map_or(Decimal::ZERO, |r| r * Decimal::ONE_HUNDRED);

        let weights: Vec<f64> = tranches.iter().map(|t| t.weight).collect();
        let notionals: Vec<f64> = tranches
            .iter()
            .map(|t| t.notional.amount().to_f64().unwrap_or(0.0))
            .collect();
        let returns: Vec<f64> = tranches
            .iter()
            .map(|t| t.return_pct.to_f64().unwrap_or(0.0))
            .collect();

        Ok(PerformanceReport {
            instrument: self.instrument().clone(),
            current_price,
            average_cost: self.average_cost(),
            total_notional,
            market_value,
            unrealized_pnl,
            total_return_pct,
            concentration_score: concentration_score(&weights),
            efficiency_score: efficiency_score(&notionals, &returns),
            tranches,
        })
    }
}

impl PerformanceReport {
    /// Stop/target levels from the instrument's thresholds.
    #[must_use]
    pub fn exit_check(&self, config: &InstrumentConfig) -> ExitCheck {
        let stop_price =
            self.average_cost * (Decimal::ONE - config.stop_loss_pct / Decimal::ONE_HUNDRED);
        let target_price =
            self.average_cost * (Decimal::ONE + config.take_profit_pct / Decimal::ONE_HUNDRED);
        let trigger = if self.current_price <= stop_price {
            Some(ExitTrigger::StopLoss)
        } else if self.current_price >= target_price {
            Some(ExitTrigger::TakeProfit)
        } else {
            None
        };
        ExitCheck {
            stop_price,
            target_price,
            trigger,
        }
    }
}

/// `Σ(wᵢ − 1/k)² / (1 − 1/k)`, in `[0, 1]`; zero for a single tranche.
fn concentration_score(weights: &[f64]) -> f64 {
    let k = weights.len();
    if k <= 1 {
        return 0.0;
    }
    let equal = 1.0 / k as f64;
    let dispersion: f64 = weights.iter().map(|w| (w - equal).powi(2)).sum();
    (dispersion / (1.0 - equal)).clamp(0.0, 1.0)
}

/// `0.5 + 0.5 · pearson(notional, return)`, or 0.5 when undefined.
fn efficiency_score(notionals: &[f64], returns: &[f64]) -> f64 {
    pearson(notionals, returns).map_or(0.5, |r| (0.5 + 0.5 * r).clamp(0.0, 1.0))
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(cov / denom)
}
