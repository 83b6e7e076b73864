//! Brokerage connection settings.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::TradingMode;
use crate::infrastructure::broker::RestBrokerConfig;

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Trading API base URL override.
    #[serde(default)]
    pub trading_base_url: Option<String>,
    /// Market data API base URL override.
    #[serde(default)]
    pub data_base_url: Option<String>,
    /// API key.
    #[serde(default)]
    pub api_key: String,
    /// API secret.
    #[serde(default)]
    pub api_secret: String,
    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Paper broker state for `SIMULATED` mode.
    #[serde(default)]
    pub simulated: SimulatedBrokerConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            trading_base_url: None,
            data_base_url: None,
            api_key: String::new(),
            api_secret: String::new(),
            timeout_secs: default_timeout_secs(),
            simulated: SimulatedBrokerConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// REST adapter settings for `mode`, applying any URL overrides.
    #[must_use]
    pub fn rest_config(&self, mode: TradingMode) -> RestBrokerConfig {
        let mut rest = match mode {
            TradingMode::Live => RestBrokerConfig::live(&self.api_key, &self.api_secret),
            TradingMode::Paper | TradingMode::Simulated => {
                RestBrokerConfig::paper(&self.api_key, &self.api_secret)
            }
        };
        if let Some(url) = &self.trading_base_url {
            rest.trading_base_url.clone_from(url);
        }
        if let Some(url) = &self.data_base_url {
            rest.data_base_url.clone_from(url);
        }
        rest.timeout = Duration::from_secs(self.timeout_secs);
        rest
    }
}

/// Starting state of the in-process paper broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedBrokerConfig {
    /// Prices by instrument id.
    #[serde(default)]
    pub prices: HashMap<String, Decimal>,
    /// Balances by asset.
    #[serde(default)]
    pub balances: HashMap<String, Decimal>,
    /// Fee rate charged on notional.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    /// Artificial latency per call in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
}

impl Default for SimulatedBrokerConfig {
    fn default() -> Self {
        Self {
            prices: HashMap::new(),
            balances: HashMap::new(),
            fee_rate: default_fee_rate(),
            latency_ms: 0,
        }
    }
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_fee_rate() -> Decimal {
    dec!(0.001)
}
