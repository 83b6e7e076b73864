//! Order state as reported by the brokerage.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::TradeStatus;

/// Brokerage-side order state.
///
/// Unrecognised states deserialize to `Unknown` and are treated as
/// unresolved so the trade is retried on the next reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteOrderState {
    /// Accepted, not yet filled.
    Open,
    /// Some quantity filled.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Filled and settled.
    Settled,
    /// Cancelled before completion.
    Cancelled,
    /// Rejected by the venue.
    Rejected,
    /// Expired unfilled.
    Expired,
    /// Anything else the brokerage reports.
    #[serde(other)]
    Unknown,
}

impl RemoteOrderState {
    /// Internal status this remote state resolves to, if terminal.
    #[must_use]
    pub const fn resolve(&self) -> Option<TradeStatus> {
        match self {
            Self::Filled | Self::Settled => Some(TradeStatus::Completed),
            Self::Cancelled | Self::Rejected | Self::Expired => Some(TradeStatus::Failed),
            Self::Open | Self::PartiallyFilled | Self::Unknown => None,
        }
    }

    /// Returns true if the remote order will not change any more.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.resolve().is_some()
    }
}

impl fmt::Display for RemoteOrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "OPEN",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Settled => "SETTLED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_and_settled_complete() {
        assert_eq!(RemoteOrderState::Filled.resolve(), Some(TradeStatus::Completed));
        assert_eq!(RemoteOrderState::Settled.resolve(), Some(TradeStatus::Completed));
    }

    #[test]
    fn cancelled_rejected_expired_fail() {
        for state in [
            RemoteOrderState::Cancelled,
            RemoteOrderState::Rejected,
            RemoteOrderState::Expired,
        ] {
            assert_eq!(state.resolve(), Some(TradeStatus::Failed));
        }
    }

    #[test]
    fn open_states_stay_unresolved() {
        assert!(!RemoteOrderState::Open.is_terminal());
        assert!(!RemoteOrderState::PartiallyFilled.is_terminal());
        assert!(!RemoteOrderState::Unknown.is_terminal());
    }

    #[test]
    fn unrecognised_state_is_unknown() {
        let state: RemoteOrderState = serde_json::from_str("\"DONE_FOR_DAY\"").unwrap();
        assert_eq!(state, RemoteOrderState::Unknown);
    }
}
