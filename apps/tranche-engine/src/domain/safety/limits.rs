//! Configured safety limits.

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{DomainError, Money};
use crate::domain::trade_execution::Temperature;

/// Hard limits applied to every execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    /// Smallest allowed order notional.
    pub min_notional: Money,
    /// Largest allowed order notional.
    pub max_notional: Money,
    /// Trades per UTC day across all instruments.
    pub max_trades_per_day: u32,
    /// Trades per UTC day on one instrument.
    pub max_trades_per_instrument_per_day: u32,
    /// Net realized loss per UTC day before trading halts.
    pub max_daily_loss: Money,
    /// Lowest temperature tier allowed to trade.
    pub min_temperature: Temperature,
    /// Concurrently open positions.
    pub max_open_positions: u32,
    /// Consecutive losing exits before trading halts.
    pub max_consecutive_losses: u32,
    /// Net realized loss on one instrument over the trailing 7 days.
    pub max_weekly_instrument_loss: Money,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            min_notional: Money::new(dec!(10)),
            max_notional: Money::new(dec!(1000)),
            max_trades_per_day: 20,
            max_trades_per_instrument_per_day: 6,
            max_daily_loss: Money::new(dec!(100)),
            min_temperature: Temperature::Cool,
            max_open_positions: 5,
            max_consecutive_losses: 3,
            max_weekly_instrument_loss: Money::new(dec!(250)),
        }
    }
}

impl SafetyLimits {
    /// Check the limits are usable.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` naming the offending limit.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.min_notional.is_positive() {
            return Err(DomainError::invalid_value("min_notional", "must be positive"));
        }
        if self.max_notional < self.min_notional {
            return Err(DomainError::invalid_value(
                "max_notional",
                "must not be below min_notional",
            ));
        }
        if self.max_daily_loss.is_negative() || self.max_weekly_instrument_loss.is_negative() {
            return Err(DomainError::invalid_value(
                "max_daily_loss",
                "loss caps must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SafetyLimits::default().validate().is_ok());
    }

    #[test]
    fn inverted_notional_range_is_invalid() {
        let limits = SafetyLimits {
            max_notional: Money::new(dec!(5)),
            ..SafetyLimits::default()
        };
        assert!(limits.validate().is_err());
    }
}
