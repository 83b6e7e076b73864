//! Trade status in the lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal trade status.
///
/// `Pending` is the only non-terminal state; a trade moves to `Completed`
/// or `Failed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    /// Submitted (or about to be) and awaiting a terminal remote state.
    Pending,
    /// Filled at the brokerage.
    Completed,
    /// Never reached the brokerage, or was cancelled/rejected there.
    Failed,
}

impl TradeStatus {
    /// Returns true if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}
