//! The safety gate domain service.

use chrono::Duration;

use super::limits::SafetyLimits;
use super::snapshot::{SafetyRequest, SafetySnapshot};
use super::violation::{GateDecision, SafetyCheck, SafetyViolation};
use crate::domain::trade_execution::OrderSide;

/// Evaluates and ANDs every safety check.
///
/// Pure: the same request and snapshot always produce the same decision.
#[derive(Debug, Clone, Default)]
pub struct SafetyGate {
    limits: SafetyLimits,
}

impl SafetyGate {
    /// Gate enforcing `limits`.
    #[must_use]
    pub const fn new(limits: SafetyLimits) -> Self {
        Self { limits }
    }

    /// Configured limits.
    #[must_use]
    pub const fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    /// Run every check and collect all failures.
    #[must_use]
    pub fn validate(&self, request: &SafetyRequest<'_>, snapshot: &SafetySnapshot) -> GateDecision {
        let checks = [
            self.check_notional(request),
            self.check_daily_trades(snapshot),
            self.check_instrument_daily_trades(snapshot),
            self.check_daily_loss(snapshot),
            self.check_temperature(request),
            self.check_open_positions(request, snapshot),
            Self::check_tranche_capacity(request, snapshot),
            self.check_consecutive_losses(snapshot),
            Self::check_cooldown(request, snapshot),
            Self::check_price_step(request, snapshot),
            self.check_weekly_loss(snapshot),
        ];
        GateDecision::from_violations(checks.into_iter().flatten().collect())
    }

    /// Cooldown check alone, re-run under the instrument lock.
    #[must_use]
    pub fn check_cooldown(
        request: &SafetyRequest<'_>,
        snapshot: &SafetySnapshot,
    ) -> Option<SafetyViolation> {
        let elapsed = snapshot.since_last_trade()?;
        let cooldown = request.config.cooldown;
        if elapsed >= cooldown {
            return None;
        }
        Some(SafetyViolation::new(
            SafetyCheck::CooldownActive,
            format!(
                "cooldown active: {} of {} elapsed since last trade",
                format_duration(elapsed),
                format_duration(cooldown)
            ),
        ))
    }

    fn check_notional(&self, request: &SafetyRequest<'_>) -> Option<SafetyViolation> {
        if request.notional < self.limits.min_notional {
            return Some(SafetyViolation::new(
                SafetyCheck::NotionalBelowMinimum,
                format!(
                    "notional {} below minimum {}",
                    request.notional, self.limits.min_notional
                ),
            ));
        }
        if request.notional > self.limits.max_notional {
            return Some(SafetyViolation::new(
                SafetyCheck::NotionalAboveMaximum,
                format!(
                    "notional {} above maximum {}",
                    request.notional, self.limits.max_notional
                ),
            ));
        }
        None
    }

    fn check_daily_trades(&self, snapshot: &SafetySnapshot) -> Option<SafetyViolation> {
        (snapshot.trades_today >= self.limits.max_trades_per_day).then(|| {
            SafetyViolation::new(
                SafetyCheck::DailyTradeLimit,
                format!(
                    "daily trade limit reached: {} of {}",
                    snapshot.trades_today, self.limits.max_trades_per_day
                ),
            )
        })
    }

    fn check_instrument_daily_trades(&self, snapshot: &SafetySnapshot) -> Option<SafetyViolation> {
        let cap = self.limits.max_trades_per_instrument_per_day;
        (snapshot.instrument_trades_today >= cap).then(|| {
            SafetyViolation::new(
                SafetyCheck::InstrumentDailyTradeLimit,
                format!(
                    "instrument daily trade limit reached: {} of {cap}",
                    snapshot.instrument_trades_today
                ),
            )
        })
    }

    fn check_daily_loss(&self, snapshot: &SafetySnapshot) -> Option<SafetyViolation> {
        (snapshot.realized_loss_today >= self.limits.max_daily_loss
            && snapshot.realized_loss_today.is_positive())
        .then(|| {
            SafetyViolation::new(
                SafetyCheck::DailyLossLimit,
                format!(
                    "daily loss limit reached: lost {} of {} allowed",
                    snapshot.realized_loss_today, self.limits.max_daily_loss
                ),
            )
        })
    }

    fn check_temperature(&self, request: &SafetyRequest<'_>) -> Option<SafetyViolation> {
        (request.temperature < self.limits.min_temperature).then(|| {
            SafetyViolation::new(
                SafetyCheck::TemperatureTooLow,
                format!(
                    "temperature {} below minimum {}",
                    request.temperature, self.limits.min_temperature
                ),
            )
        })
    }

    fn check_open_positions(
        &self,
        request: &SafetyRequest<'_>,
        snapshot: &SafetySnapshot,
    ) -> Option<SafetyViolation> {
        let opens_new = request.side == OrderSide::Buy && !snapshot.instrument_position_open;
        (opens_new && snapshot.open_positions >= self.limits.max_open_positions).then(|| {
            SafetyViolation::new(
                SafetyCheck::OpenPositionLimit,
                format!(
                    "open position limit reached: {} of {}",
                    snapshot.open_positions, self.limits.max_open_positions
                ),
            )
        })
    }

    fn check_tranche_capacity(
        request: &SafetyRequest<'_>,
        snapshot: &SafetySnapshot,
    ) -> Option<SafetyViolation> {
        let max = request.config.max_tranches;
        (request.side == OrderSide::Buy && snapshot.instrument_tranches >= max).then(|| {
            SafetyViolation::new(
                SafetyCheck::TrancheCapacity,
                format!("tranche capacity reached: {max} of {max}"),
            )
        })
    }

    fn check_consecutive_losses(&self, snapshot: &SafetySnapshot) -> Option<SafetyViolation> {
        (snapshot.consecutive_losses >= self.limits.max_consecutive_losses).then(|| {
            SafetyViolation::new(
                SafetyCheck::ConsecutiveLosses,
                format!(
                    "consecutive loss limit reached: {} in a row",
                    snapshot.consecutive_losses
                ),
            )
        })
    }

    fn check_price_step(
        request: &SafetyRequest<'_>,
        snapshot: &SafetySnapshot,
    ) -> Option<SafetyViolation> {
        let moved = snapshot.price_move_pct()?;
        let step = request.config.min_price_step_pct;
        (moved < step).then(|| {
            SafetyViolation::new(
                SafetyCheck::PriceStepTooSmall,
                format!(
                    "price step too small: moved {}% since last trade, need {step}%",
                    moved.round_dp(2)
                ),
            )
        })
    }

    fn check_weekly_loss(&self, snapshot: &SafetySnapshot) -> Option<SafetyViolation> {
        let cap = self.limits.max_weekly_instrument_loss;
        (snapshot.weekly_instrument_loss >= cap && snapshot.weekly_instrument_loss.is_positive())
            .then(|| {
                SafetyViolation::new(
                    SafetyCheck::WeeklyLossStop,
                    format!(
                        "weekly instrument loss stop: lost {} of {cap} allowed",
                        snapshot.weekly_instrument_loss
                    ),
                )
            })
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}m{}s", secs / 60, secs % 60)
    }
}
