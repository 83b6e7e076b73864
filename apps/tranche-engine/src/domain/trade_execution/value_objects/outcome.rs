//! The tagged result of one execution attempt.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{OrderSide, TradeStatus};
use crate::domain::shared::{InstrumentId, LotId, Money, TradeId};

/// Result of `ExecutionCoordinator::execute`.
///
/// `Blocked` is routine and expected; `Failed` merits investigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    /// An order reached the brokerage.
    Executed(ExecutionReport),
    /// A policy, balance or concurrency check stopped the attempt.
    Blocked(BlockReason),
    /// Something went wrong that an operator should look at.
    Failed(FailureReason),
}

impl ExecutionOutcome {
    /// Shorthand for a blocked outcome with a single reason.
    pub fn blocked(kind: BlockKind, reason: impl Into<String>) -> Self {
        Self::Blocked(BlockReason {
            kind,
            reasons: vec![reason.into()],
        })
    }

    /// Shorthand for a failed outcome not tied to a trade.
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed(FailureReason {
            kind,
            message: message.into(),
            trade_id: None,
        })
    }

    /// `executed`, `blocked` or `failed`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Executed(_) => "executed",
            Self::Blocked(_) => "blocked",
            Self::Failed(_) => "failed",
        }
    }

    /// Returns true for `Executed`.
    #[must_use]
    pub const fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }

    /// Returns true for `Blocked`.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    /// Returns true for `Failed`.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Summary of an order that reached the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Trade created for this attempt.
    pub trade_id: TradeId,
    /// Instrument traded.
    pub instrument: InstrumentId,
    /// Direction.
    pub side: OrderSide,
    /// Notional submitted.
    pub notional: Money,
    /// `Completed` if the fill was seen immediately, else `Pending`.
    pub status: TradeStatus,
    /// Average fill price when known.
    pub filled_price: Option<Decimal>,
    /// Tranche opened by a BUY fill.
    pub tranche_ref: Option<LotId>,
    /// Realized P&L booked by a SELL fill.
    pub realized_pnl: Option<Money>,
}

/// Why an attempt was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    /// One or more safety checks failed.
    Policy,
    /// The instrument's cooldown has not elapsed (re-checked under the lock).
    Cooldown,
    /// Another execution holds the instrument lock.
    ConcurrentExecution,
    /// Not enough quote currency (BUY) or base holdings (SELL).
    InsufficientBalance,
}

impl BlockKind {
    /// Lowercase label for metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Cooldown => "cooldown",
            Self::ConcurrentExecution => "concurrent_execution",
            Self::InsufficientBalance => "insufficient_balance",
        }
    }
}

/// Structured block reason; `reasons` lists every failing check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReason {
    /// Category.
    pub kind: BlockKind,
    /// Human-readable reasons, one per failing check.
    pub reasons: Vec<String>,
}

impl BlockReason {
    /// Returns true if any reason mentions `needle` (case-insensitive).
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.reasons
            .iter()
            .any(|reason| reason.to_lowercase().contains(&needle))
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reasons.join("; "))
    }
}

/// Why an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Unknown or malformed instrument configuration.
    Configuration,
    /// The decision itself is malformed.
    InvalidDecision,
    /// Price or balance lookups failed after retries.
    MarketData,
    /// Order submission failed after retries.
    Submission,
    /// The brokerage cancelled or rejected the order.
    Rejected,
    /// The brokerage returned data that cannot be applied.
    DataIntegrity,
    /// Lock store or repository failure.
    Infrastructure,
    /// The locked section panicked.
    Internal,
}

impl FailureKind {
    /// Lowercase label for metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::InvalidDecision => "invalid_decision",
            Self::MarketData => "market_data",
            Self::Submission => "submission",
            Self::Rejected => "rejected",
            Self::DataIntegrity => "data_integrity",
            Self::Infrastructure => "infrastructure",
            Self::Internal => "internal",
        }
    }
}

/// Structured failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Category.
    pub kind: FailureKind,
    /// Details.
    pub message: String,
    /// Trade recorded for the attempt, if one was created.
    pub trade_id: Option<TradeId>,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_label(), self.message)
    }
}
