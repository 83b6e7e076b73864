//! Upstream trading decision.

use serde::{Deserialize, Serialize};

use super::{OrderSide, Temperature};
use crate::domain::shared::{DomainError, InstrumentId, Money};

/// A decision produced by the (external) signal layer.
///
/// The engine only decides *whether* and *how much*; *what* to trade is
/// given here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingDecision {
    /// Instrument to trade.
    pub instrument: InstrumentId,
    /// Direction.
    pub side: OrderSide,
    /// Signal confidence in `[0, 1]`.
    pub confidence: f64,
    /// Confidence tier.
    pub temperature: Temperature,
    /// Explicit notional; when absent the engine sizes the order itself.
    #[serde(default)]
    pub target_notional: Option<Money>,
}

impl TradingDecision {
    /// Decision without an explicit notional.
    #[must_use]
    pub fn new(
        instrument: InstrumentId,
        side: OrderSide,
        confidence: f64,
        temperature: Temperature,
    ) -> Self {
        Self {
            instrument,
            side,
            confidence,
            temperature,
            target_notional: None,
        }
    }

    /// Set an explicit notional.
    #[must_use]
    pub fn with_target_notional(mut self, notional: Money) -> Self {
        self.target_notional = Some(notional);
        self
    }

    /// Reject decisions that cannot be acted on.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` for a non-finite or out-of-range
    /// confidence, or a non-positive target notional.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(DomainError::invalid_value(
                "confidence",
                format!("{} is outside [0, 1]", self.confidence),
            ));
        }
        if let Some(notional) = self.target_notional
            && !notional.is_positive()
        {
            return Err(DomainError::invalid_value(
                "target_notional",
                "must be positive when given",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deserializes_without_target_notional() {
        let json = r#"{"instrument":"BTC-USD","side":"BUY","confidence":0.7,"temperature":"HOT"}"#;
        let decision: TradingDecision = serde_json::from_str(json).unwrap();
        assert_eq!(decision.instrument.as_str(), "BTC-USD");
        assert_eq!(decision.side, OrderSide::Buy);
        assert_eq!(decision.temperature, Temperature::Hot);
        assert!(decision.target_notional.is_none());
        assert!(decision.validate().is_ok());
    }

    #[test]
    fn deserializes_numeric_target_notional() {
        let json = r#"{"instrument":"BTC-USD","side":"SELL","confidence":0.2,"temperature":"COOL","target_notional":250.5}"#;
        let decision: TradingDecision = serde_json::from_str(json).unwrap();
        assert_eq!(decision.target_notional, Some(Money::new(dec!(250.5))));
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let decision = TradingDecision::new(
            InstrumentId::new("BTC-USD"),
            OrderSide::Buy,
            1.5,
            Temperature::Warm,
        );
        assert!(decision.validate().is_err());

        let nan = TradingDecision {
            confidence: f64::NAN,
            ..decision
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_target() {
        let decision = TradingDecision::new(
            InstrumentId::new("BTC-USD"),
            OrderSide::Buy,
            0.5,
            Temperature::Warm,
        )
        .with_target_notional(Money::ZERO);
        assert!(decision.validate().is_err());
    }
}
