//! Per-instrument trading configuration.

use std::collections::HashMap;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{InstrumentId, Money};
use crate::domain::shared::DomainError;

/// How the strategy component of a tranche size reacts to price vs. average cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingStrategy {
    /// Always the base order notional.
    #[default]
    Fixed,
    /// Buy more when price is below average cost.
    DipWeighted,
    /// Buy more when price is above average cost (add to winners).
    Pyramid,
}

/// Configuration for one tradeable instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentConfig {
    /// Instrument identifier (`BASE-QUOTE`).
    pub id: InstrumentId,
    /// Reference notional for one tranche.
    pub base_order_notional: Money,
    /// Minimum time between trades on this instrument.
    pub cooldown: Duration,
    /// Minimum absolute price move since the last trade, in percent.
    pub min_price_step_pct: Decimal,
    /// Maximum number of open tranches.
    pub max_tranches: u32,
    /// Stop-loss distance below average cost, in percent.
    pub stop_loss_pct: Decimal,
    /// Take-profit distance above average cost, in percent.
    pub take_profit_pct: Decimal,
    /// Strategy component of tranche sizing.
    pub sizing_strategy: SizingStrategy,
    /// Smallest order as a multiple of the base notional.
    pub min_order_factor: Decimal,
    /// Largest order as a multiple of the base notional.
    pub max_order_factor: Decimal,
}

impl InstrumentConfig {
    /// Config with conservative defaults for everything but the id and base notional.
    #[must_use]
    pub fn new(id: InstrumentId, base_order_notional: Money) -> Self {
        Self {
            id,
            base_order_notional,
            cooldown: Duration::minutes(15),
            min_price_step_pct: dec!(2),
            max_tranches: 5,
            stop_loss_pct: dec!(10),
            take_profit_pct: dec!(20),
            sizing_strategy: SizingStrategy::Fixed,
            min_order_factor: dec!(0.5),
            max_order_factor: dec!(2),
        }
    }

    /// Set the cooldown.
    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the minimum price step (percent).
    #[must_use]
    pub const fn with_min_price_step_pct(mut self, pct: Decimal) -> Self {
        self.min_price_step_pct = pct;
        self
    }

    /// Set the tranche capacity.
    #[must_use]
    pub const fn with_max_tranches(mut self, max_tranches: u32) -> Self {
        self.max_tranches = max_tranches;
        self
    }

    /// Set the sizing strategy.
    #[must_use]
    pub const fn with_sizing_strategy(mut self, strategy: SizingStrategy) -> Self {
        self.sizing_strategy = strategy;
        self
    }

    /// Set stop-loss and take-profit distances (percent).
    #[must_use]
    pub const fn with_exit_thresholds(
        mut self,
        stop_loss_pct: Decimal,
        take_profit_pct: Decimal,
    ) -> Self {
        self.stop_loss_pct = stop_loss_pct;
        self.take_profit_pct = take_profit_pct;
        self
    }

    /// Smallest order notional the sizer may produce.
    #[must_use]
    pub fn min_order_notional(&self) -> Money {
        self.base_order_notional * self.min_order_factor
    }

    /// Largest order notional the sizer may produce.
    #[must_use]
    pub fn max_order_notional(&self) -> Money {
        self.base_order_notional * self.max_order_factor
    }

    /// Check the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` naming the first malformed field.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.assets().is_none() {
            return Err(DomainError::invalid_value(
                "id",
                format!("'{}' is not in BASE-QUOTE form", self.id),
            ));
        }
        if !self.base_order_notional.is_positive() {
            return Err(DomainError::invalid_value(
                "base_order_notional",
                "must be positive",
            ));
        }
        if self.cooldown < Duration::zero() {
            return Err(DomainError::invalid_value("cooldown", "must not be negative"));
        }
        if self.min_price_step_pct.is_sign_negative() {
            return Err(DomainError::invalid_value(
                "min_price_step_pct",
                "must not be negative",
            ));
        }
        if self.max_tranches == 0 {
            return Err(DomainError::invalid_value("max_tranches", "must be at least 1"));
        }
        if self.stop_loss_pct <= Decimal::ZERO || self.stop_loss_pct >= dec!(100) {
            return Err(DomainError::invalid_value(
                "stop_loss_pct",
                "must be between 0 and 100 (exclusive)",
            ));
        }
        if self.take_profit_pct <= Decimal::ZERO {
            return Err(DomainError::invalid_value("take_profit_pct", "must be positive"));
        }
        if self.min_order_factor <= Decimal::ZERO || self.min_order_factor > self.max_order_factor {
            return Err(DomainError::invalid_value(
                "min_order_factor",
                "must be positive and not exceed max_order_factor",
            ));
        }
        Ok(())
    }
}

/// Lookup table of configured instruments.
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    instruments: HashMap<InstrumentId, InstrumentConfig>,
}

impl InstrumentRegistry {
    /// Build from a list of configs. Later duplicates replace earlier ones.
    #[must_use]
    pub fn new(configs: impl IntoIterator<Item = InstrumentConfig>) -> Self {
        Self {
            instruments: configs.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// Config for an instrument, if registered.
    #[must_use]
    pub fn get(&self, id: &InstrumentId) -> Option<&InstrumentConfig> {
        self.instruments.get(id)
    }

    /// Registered instrument ids.
    pub fn ids(&self) -> impl Iterator<Item = &InstrumentId> {
        self.instruments.keys()
    }

    /// Number of registered instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether no instrument is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> InstrumentConfig {
        InstrumentConfig::new(InstrumentId::new("BTC-USD"), Money::new(dec!(100)))
    }

    #[test]
    fn default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn order_bounds_follow_factors() {
        let config = config();
        assert_eq!(config.min_order_notional(), Money::new(dec!(50)));
        assert_eq!(config.max_order_notional(), Money::new(dec!(200)));
    }

    #[test]
    fn rejects_malformed_id() {
        let mut config = config();
        config.id = InstrumentId::new("BTCUSD");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("BASE-QUOTE"));
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = config().with_max_tranches(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_tranches"));
    }

    #[test]
    fn rejects_non_positive_base_notional() {
        let mut config = config();
        config.base_order_notional = Money::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_factors() {
        let mut config = config();
        config.min_order_factor = dec!(3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_stop_loss_out_of_range() {
        assert!(config().with_exit_thresholds(dec!(100), dec!(10)).validate().is_err());
        assert!(config().with_exit_thresholds(dec!(0), dec!(10)).validate().is_err());
    }

    #[test]
    fn registry_lookup() {
        let registry = InstrumentRegistry::new([config()]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&InstrumentId::new("BTC-USD")).is_some());
        assert!(registry.get(&InstrumentId::new("ETH-USD")).is_none());
    }

    #[test]
    fn sizing_strategy_serde_names() {
        let s: SizingStrategy = serde_json::from_str("\"DIP_WEIGHTED\"").unwrap();
        assert_eq!(s, SizingStrategy::DipWeighted);
    }
}
