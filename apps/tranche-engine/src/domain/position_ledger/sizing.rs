//! Tranche sizing.
//!
//! `notional = optimal_tranche_size × temperature × signal strength × progression`,
//! clamped to the instrument's `[min, max]` order notional.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::position::Position;
use crate::domain::shared::{InstrumentConfig, Money, SizingStrategy};
use crate::domain::trade_execution::{OrderSide, Temperature};

/// Tunable sizing multipliers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingParameters {
    /// Multiplier for `FROZEN`.
    pub frozen_multiplier: Decimal,
    /// Multiplier for `COOL`.
    pub cool_multiplier: Decimal,
    /// Multiplier for `WARM`.
    pub warm_multiplier: Decimal,
    /// Multiplier for `HOT`.
    pub hot_multiplier: Decimal,
    /// Reduction per existing tranche.
    pub progression_decay: Decimal,
    /// Lower bound of the progression multiplier.
    pub progression_floor: Decimal,
}

impl Default for SizingParameters {
    fn default() -> Self {
        Self {
            frozen_multiplier: Decimal::ZERO,
            cool_multiplier: dec!(0.5),
            warm_multiplier: Decimal::ONE,
            hot_multiplier: dec!(1.5),
            progression_decay: dec!(0.15),
            progression_floor: dec!(0.25),
        }
    }
}

/// Inputs for one sizing computation.
#[derive(Debug, Clone, Copy)]
pub struct SizingInput<'a> {
    /// Instrument configuration.
    pub config: &'a InstrumentConfig,
    /// Current position.
    pub position: &'a Position,
    /// Direction.
    pub side: OrderSide,
    /// Current price.
    pub price: Decimal,
    /// Decision temperature.
    pub temperature: Temperature,
    /// Decision confidence.
    pub confidence: f64,
}

/// How a notional was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingBreakdown {
    /// Strategy component (`optimal_tranche_size`), or the exit value for a SELL.
    pub strategy_notional: Money,
    /// Temperature multiplier (1 for a SELL).
    pub temperature_multiplier: Decimal,
    /// Signal strength multiplier (1 for a SELL).
    pub signal_multiplier: Decimal,
    /// Tranche progression multiplier (1 for a SELL).
    pub progression_multiplier: Decimal,
    /// Final, clamped notional. Zero when the temperature forbids trading.
    pub notional: Money,
}

/// Domain service computing order notional.
#[derive(Debug, Clone, Default)]
pub struct TrancheSizer {
    params: SizingParameters,
}

impl TrancheSizer {
    /// Sizer with the given parameters.
    #[must_use]
    pub const fn new(params: SizingParameters) -> Self {
        Self { params }
    }

    /// Compute the order notional.
    ///
    /// A SELL exits the position's market value (the base notional when flat),
    /// capped at the maximum order notional.
    #[must_use]
    pub fn size(&self, input: &SizingInput<'_>) -> SizingBreakdown {
        let config = input.config;
        let min = config.min_order_notional();
        let max = config.max_order_notional();

        if input.side == OrderSide::Sell {
            let strategy_notional = if input.position.is_flat() {
                config.base_order_notional.clamp_between(min, max)
            } else {
                input.position.market_value(input.price).min(max)
            };
            return SizingBreakdown {
                strategy_notional,
                temperature_multiplier: Decimal::ONE,
                signal_multiplier: Decimal::ONE,
                progression_multiplier: Decimal::ONE,
                notional: strategy_notional,
            };
        }

        let strategy_notional = self.optimal_tranche_size(config, input.position, input.price);
        let temperature_multiplier = self.temperature_multiplier(input.temperature);
        let signal_multiplier = Self::signal_strength_multiplier(input.confidence);
        let progression_multiplier =
            self.tranche_progression_multiplier(input.position.tranche_count());

        let raw = strategy_notional
            * temperature_multiplier
            * signal_multiplier
            * progression_multiplier;
        let notional = if raw.is_positive() {
            raw.clamp_between(min, max).round()
        } else {
            Money::ZERO
        };

        SizingBreakdown {
            strategy_notional,
            temperature_multiplier,
            signal_multiplier,
            progression_multiplier,
            notional,
        }
    }

    /// Strategy component of the tranche size.
    ///
    /// - `Fixed`: base notional.
    /// - `DipWeighted`: below average cost, `base × (1 + min(dip% × 0.1, 1))`;
    ///   above it, `base × 0.75`.
    /// - `Pyramid`: above average cost, `base × (1 + min(gain% × 0.05, 0.5))`;
    ///   below it, `base × 0.5`.
    ///
    /// With no position every strategy returns the base notional.
    #[must_use]
    pub fn optimal_tranche_size(
        &self,
        config: &InstrumentConfig,
        position: &Position,
        price: Decimal,
    ) -> Money {
        let base = config.base_order_notional;
        let avg = position.average_cost();
        if position.is_flat() || avg <= Decimal::ZERO {
            return base;
        }
        let move_pct = (price - avg) / avg * Decimal::ONE_HUNDRED;

        let factor = match config.sizing_strategy {
            SizingStrategy::Fixed => Decimal::ONE,
            SizingStrategy::DipWeighted => {
                if move_pct < Decimal::ZERO {
                    Decimal::ONE + (move_pct.abs() * dec!(0.1)).min(Decimal::ONE)
                } else if move_pct > Decimal::ZERO {
                    dec!(0.75)
                } else {
                    Decimal::ONE
                }
            }
            SizingStrategy::Pyramid => {
                if move_pct > Decimal::ZERO {
                    Decimal::ONE + (move_pct * dec!(0.05)).min(dec!(0.5))
                } else if move_pct < Decimal::ZERO {
                    dec!(0.5)
                } else {
                    Decimal::ONE
                }
            }
        };
        base * factor
    }

    /// Multiplier for a temperature tier.
    #[must_use]
    pub fn temperature_multiplier(&self, temperature: Temperature) -> Decimal {
        match temperature {
            Temperature::Frozen => self.params.frozen_multiplier,
            Temperature::Cool => self.params.cool_multiplier,
            Temperature::Warm => self.params.warm_multiplier,
            Temperature::Hot => self.params.hot_multiplier,
        }
    }

    /// `0.5 + confidence`, with confidence clamped to `[0, 1]`.
    #[must_use]
    pub fn signal_strength_multiplier(confidence: f64) -> Decimal {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let confidence = Decimal::try_from(confidence)
            .unwrap_or(Decimal::ZERO)
            .round_dp(4);
        dec!(0.5) + confidence
    }

    /// `max(floor, 1 − decay × open_tranches)`.
    #[must_use]
    pub fn tranche_progression_multiplier(&self, open_tranches: usize) -> Decimal {
        let decayed = Decimal::ONE - self.params.progression_decay * Decimal::from(open_tranches);
        decayed.max(self.params.progression_floor)
    }
}
