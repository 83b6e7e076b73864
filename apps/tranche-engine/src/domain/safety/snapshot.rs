//! Inputs to the safety gate.

use chrono::Duration;
use rust_decimal::Decimal;

use crate::domain::shared::{InstrumentConfig, Money, Timestamp};
use crate::domain::trade_execution::{OrderSide, Temperature};

/// The attempt being validated.
#[derive(Debug, Clone, Copy)]
pub struct SafetyRequest<'a> {
    /// Instrument configuration (cooldown, price step, capacity).
    pub config: &'a InstrumentConfig,
    /// Direction.
    pub side: OrderSide,
    /// Order notional.
    pub notional: Money,
    /// Decision temperature.
    pub temperature: Temperature,
}

/// The instrument's most recent trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastTrade {
    /// Fill time, or creation time if still pending.
    pub at: Timestamp,
    /// Fill price, or reference price if still pending.
    pub price: Decimal,
}

/// Ledger and market state the checks are evaluated against.
///
/// Loss fields hold the loss as a non-negative amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetySnapshot {
    /// Evaluation instant.
    pub now: Timestamp,
    /// Current market price.
    pub current_price: Decimal,
    /// Non-failed trades created today, all instruments.
    pub trades_today: u32,
    /// Non-failed trades created today on this instrument.
    pub instrument_trades_today: u32,
    /// Net realized loss today, all instruments.
    pub realized_loss_today: Money,
    /// Positions currently not closed.
    pub open_positions: u32,
    /// Whether this instrument already has an open position.
    pub instrument_position_open: bool,
    /// Open tranches on this instrument.
    pub instrument_tranches: u32,
    /// Losing exits in a row, most recent first.
    pub consecutive_losses: u32,
    /// Most recent non-failed trade on this instrument.
    pub last_trade: Option<LastTrade>,
    /// Net realized loss on this instrument over the trailing 7 days.
    pub weekly_instrument_loss: Money,
}

impl SafetySnapshot {
    /// A snapshot with no history, for a fresh instrument.
    #[must_use]
    pub const fn empty(now: Timestamp, current_price: Decimal) -> Self {
        Self {
            now,
            current_price,
            trades_today: 0,
            instrument_trades_today: 0,
            realized_loss_today: Money::ZERO,
            open_positions: 0,
            instrument_position_open: false,
            instrument_tranches: 0,
            consecutive_losses: 0,
            last_trade: None,
            weekly_instrument_loss: Money::ZERO,
        }
    }

    /// Time since the last trade, if any.
    #[must_use]
    pub fn since_last_trade(&self) -> Option<Duration> {
        self.last_trade.map(|last| self.now.duration_since(last.at))
    }

    /// Absolute percentage move since the last trade's price, if any.
    #[must_use]
    pub fn price_move_pct(&self) -> Option<Decimal> {
        let last = self.last_trade?;
        let change = (self.current_price - last.price).abs();
        change
            .checked_div(last.price)
            .map(|r| r * Decimal::ONE_HUNDRED)
    }
}
