//! Trading environment selection.

use serde::{Deserialize, Serialize};

/// Which venue orders go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingMode {
    /// In-process paper broker; no network.
    #[default]
    Simulated,
    /// Brokerage paper-trading endpoints.
    Paper,
    /// Brokerage live endpoints.
    Live,
}

impl TradingMode {
    /// Whether orders reach a remote brokerage.
    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::Paper | Self::Live)
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Simulated => "SIMULATED",
            Self::Paper => "PAPER",
            Self::Live => "LIVE",
        };
        write!(f, "{s}")
    }
}

/// Environment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Trading mode.
    #[serde(default)]
    pub mode: TradingMode,
}
