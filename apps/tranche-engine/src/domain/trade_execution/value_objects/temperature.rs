//! Upstream confidence tier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal confidence tier attached to a trading decision.
///
/// Ordering is `Frozen < Cool < Warm < Hot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Temperature {
    /// No conviction; never trades.
    Frozen,
    /// Low conviction.
    Cool,
    /// Normal conviction.
    Warm,
    /// High conviction.
    Hot,
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Frozen => "FROZEN",
            Self::Cool => "COOL",
            Self::Warm => "WARM",
            Self::Hot => "HOT",
        };
        f.write_str(s)
    }
}
