//! Per-instrument entries.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{InstrumentConfig, InstrumentId, Money, SizingStrategy};

/// One `instruments:` list entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentEntry {
    /// Instrument id, `BASE-QUOTE`.
    pub id: String,
    /// Reference notional per tranche.
    pub base_order_notional: Decimal,
    /// Minutes between trades.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
    /// Minimum price move since the last trade, percent.
    #[serde(default = "default_min_price_step_pct")]
    pub min_price_step_pct: Decimal,
    /// Tranche capacity.
    #[serde(default = "default_max_tranches")]
    pub max_tranches: u32,
    /// Stop-loss distance, percent.
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Take-profit distance, percent.
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Sizing strategy.
    #[serde(default)]
    pub sizing_strategy: SizingStrategy,
    /// Smallest order as a multiple of the base notional.
    #[serde(default = "default_min_order_factor")]
    pub min_order_factor: Decimal,
    /// Largest order as a multiple of the base notional.
    #[serde(default = "default_max_order_factor")]
    pub max_order_factor: Decimal,
}

impl InstrumentEntry {
    /// Domain configuration for this entry.
    #[must_use]
    pub fn to_config(&self) -> InstrumentConfig {
        InstrumentConfig {
            id: InstrumentId::new(self.id.clone()),
            base_order_notional: Money::new(self.base_order_notional),
            cooldown: Duration::minutes(self.cooldown_minutes),
            min_price_step_pct: self.min_price_step_pct,
            max_tranches: self.max_tranches,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            sizing_strategy: self.sizing_strategy,
            min_order_factor: self.min_order_factor,
            max_order_factor: self.max_order_factor,
        }
    }
}

const fn default_cooldown_minutes() -> i64 {
    15
}

fn default_min_price_step_pct() -> Decimal {
    dec!(2)
}

const fn default_max_tranches() -> u32 {
    5
}

fn default_stop_loss_pct() -> Decimal {
    dec!(10)
}

fn default_take_profit_pct() -> Decimal {
    dec!(20)
}

fn default_min_order_factor() -> Decimal {
    dec!(0.5)
}

fn default_max_order_factor() -> Decimal {
    dec!(2)
}
