//! REST adapter configuration.

use std::time::Duration;

/// Connection settings for [`RestBrokerAdapter`](super::RestBrokerAdapter).
#[derive(Clone)]
pub struct RestBrokerConfig {
    /// Trading API base URL (orders, account, positions).
    pub trading_base_url: String,
    /// Market data API base URL (latest trades).
    pub data_base_url: String,
    /// API key.
    pub api_key: String,
    /// API secret.
    pub api_secret: String,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl RestBrokerConfig {
    /// Paper-trading endpoints.
    #[must_use]
    pub fn paper(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            trading_base_url: "https://paper-api.alpaca.markets".to_string(),
            data_base_url: "https://data.alpaca.markets".to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Live-trading endpoints.
    #[must_use]
    pub fn live(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            trading_base_url: "https://api.alpaca.markets".to_string(),
            ..Self::paper(api_key, api_secret)
        }
    }
}

// Credentials stay out of logs
impl std::fmt::Debug for RestBrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBrokerConfig")
            .field("trading_base_url", &self.trading_base_url)
            .field("data_base_url", &self.data_base_url)
            .field("api_key", &"***")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
