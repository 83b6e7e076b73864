//! Gate results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Individual safety checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyCheck {
    /// Order notional below the minimum.
    NotionalBelowMinimum,
    /// Order notional above the maximum.
    NotionalAboveMaximum,
    /// Global trades-per-day cap reached.
    DailyTradeLimit,
    /// Per-instrument trades-per-day cap reached.
    InstrumentDailyTradeLimit,
    /// Daily realized loss cap reached.
    DailyLossLimit,
    /// Temperature below the minimum tier.
    TemperatureTooLow,
    /// Open-position cap reached (new positions only).
    OpenPositionLimit,
    /// Instrument already holds its maximum tranches.
    TrancheCapacity,
    /// Consecutive losing exits cap reached.
    ConsecutiveLosses,
    /// Instrument cooldown not elapsed.
    CooldownActive,
    /// Price has not moved enough since the last trade.
    PriceStepTooSmall,
    /// Trailing-week instrument loss cap reached.
    WeeklyLossStop,
}

impl SafetyCheck {
    /// Stable violation code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotionalBelowMinimum => "NOTIONAL_BELOW_MINIMUM",
            Self::NotionalAboveMaximum => "NOTIONAL_ABOVE_MAXIMUM",
            Self::DailyTradeLimit => "DAILY_TRADE_LIMIT",
            Self::InstrumentDailyTradeLimit => "INSTRUMENT_DAILY_TRADE_LIMIT",
            Self::DailyLossLimit => "DAILY_LOSS_LIMIT",
            Self::TemperatureTooLow => "TEMPERATURE_TOO_LOW",
            Self::OpenPositionLimit => "OPEN_POSITION_LIMIT",
            Self::TrancheCapacity => "TRANCHE_CAPACITY",
            Self::ConsecutiveLosses => "CONSECUTIVE_LOSSES",
            Self::CooldownActive => "COOLDOWN_ACTIVE",
            Self::PriceStepTooSmall => "PRICE_STEP_TOO_SMALL",
            Self::WeeklyLossStop => "WEEKLY_LOSS_STOP",
        }
    }
}

impl fmt::Display for SafetyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyViolation {
    /// Which check.
    pub check: SafetyCheck,
    /// Human-readable explanation.
    pub message: String,
}

impl SafetyViolation {
    /// Create a violation.
    #[must_use]
    pub fn new(check: SafetyCheck, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.check, self.message)
    }
}

/// Outcome of `SafetyGate::validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    violations: Vec<SafetyViolation>,
}

impl GateDecision {
    /// Decision from a list of violations.
    #[must_use]
    pub const fn from_violations(violations: Vec<SafetyViolation>) -> Self {
        Self { violations }
    }

    /// True iff every check passed.
    #[must_use]
    pub fn allowed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Every failed check.
    #[must_use]
    pub fn violations(&self) -> &[SafetyViolation] {
        &self.violations
    }

    /// Messages of every failed check.
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.message.clone()).collect()
    }

    /// Whether a specific check failed.
    #[must_use]
    pub fn failed(&self, check: SafetyCheck) -> bool {
        self.violations.iter().any(|v| v.check == check)
    }
}
