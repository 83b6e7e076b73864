//! Assembles the [`SafetySnapshot`] the gate evaluates.
//!
//! Loss figures are true realized P&L net of fees, summed over completed
//! SELL fills.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use crate::domain::position_ledger::PositionRepository;
use crate::domain::safety::{LastTrade, SafetySnapshot};
use crate::domain::shared::{InstrumentId, Money, RepositoryError, Timestamp};
use crate::domain::trade_execution::{Trade, TradeRepository, TradeStatus};
use crate::observability;

/// Trailing window for the weekly loss stop and the loss streak.
const LOOKBACK_DAYS: i64 = 7;

/// Reads ledger state into gate snapshots.
pub struct SafetyContext<T, P>
where
    T: TradeRepository,
    P: PositionRepository,
{
    trades: Arc<T>,
    positions: Arc<P>,
}

impl<T, P> SafetyContext<T, P>
where
    T: TradeRepository,
    P: PositionRepository,
{
    /// Create a context reader.
    pub const fn new(trades: Arc<T>, positions: Arc<P>) -> Self {
        Self { trades, positions }
    }

    /// Snapshot for `instrument` at `now` with the current market price.
    ///
    /// # Errors
    ///
    /// Returns an error if a repository query fails.
    pub async fn snapshot(
        &self,
        instrument: &InstrumentId,
        current_price: Decimal,
        now: Timestamp,
    ) -> Result<SafetySnapshot, RepositoryError> {
        let day_start = now.start_of_day();
        let week_start = now.minus(Duration::days(LOOKBACK_DAYS));

        let recent = self.trades.find_since(week_start.min(day_start)).await?;
        let history = self.trades.find_by_instrument(instrument).await?;
        let open = self.positions.find_open().await?;
        let position = self.positions.find_by_instrument(instrument).await?;
        observability::update_open_positions(open.len());

        let live_today = recent
            .iter()
            .filter(|t| t.status() != TradeStatus::Failed && t.created_at() >= day_start);
        let (trades_today, instrument_trades_today) =
            live_today.fold((0u32, 0u32), |(all, mine), t| {
                (all + 1, mine + u32::from(t.instrument() == instrument))
            });

        let realized_loss_today = loss(net_pnl_since(recent.iter(), day_start));
        let weekly_instrument_loss = loss(net_pnl_since(
            recent.iter().filter(|t| t.instrument() == instrument),
            week_start,
        ));

        let last_trade = history
            .iter()
            .filter(|t| t.status() != TradeStatus::Failed)
            .max_by_key(|t| t.activity_at())
            .map(|t| LastTrade {
                at: t.activity_at(),
                price: t.last_price(),
            });

        let (instrument_position_open, instrument_tranches) =
            position.as_ref().map_or((false, 0), |p| {
                (p.status().is_open(), p.tranche_count() as u32)
            });

        Ok(SafetySnapshot {
            now,
            current_price,
            trades_today,
            instrument_trades_today,
            realized_loss_today,
            open_positions: open.len() as u32,
            instrument_position_open,
            instrument_tranches,
            consecutive_losses: consecutive_losses(&recent),
            last_trade,
            weekly_instrument_loss,
        })
    }
}

/// Net P&L of exits filled at or after `since`.
fn net_pnl_since<'a>(trades: impl Iterator<Item = &'a Trade>, since: Timestamp) -> Money {
    trades
        .filter(|t| t.filled_at().is_some_and(|at| at >= since))
        .filter_map(Trade::net_pnl)
        .sum()
}

fn loss(net: Money) -> Money {
    if net.is_negative() { -net } else { Money::ZERO }
}

/// Losing exits in a row, newest first, stopping at the first non-loss.
fn consecutive_losses(trades: &[Trade]) -> u32 {
    let mut exits: Vec<(Timestamp, Money)> = trades
        .iter()
        .filter_map(|t| Some((t.filled_at()?, t.net_pnl()?)))
        .collect();
    exits.sort_by(|a, b| b.0.cmp(&a.0));
    exits
        .iter()
        .take_while(|(_, pnl)| pnl.is_negative())
        .count() as u32
}
