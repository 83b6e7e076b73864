//! Configuration module for the tranche engine.
//!
//! Loads a YAML file, interpolates environment variables and validates the
//! result before anything is constructed.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tranche_engine::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("deploy/config.yaml"))?;
//! ```

mod broker;
mod environment;
mod execution;
mod gateway;
mod instruments;
mod observability;
mod reconciliation;

use std::collections::HashSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use broker::{BrokerConfig, SimulatedBrokerConfig};
pub use environment::{EnvironmentConfig, TradingMode};
pub use execution::ExecutionConfig;
pub use gateway::GatewayConfig;
pub use instruments::InstrumentEntry;
pub use observability::ObservabilityConfig;
pub use reconciliation::ReconciliationConfig;

use crate::domain::safety::SafetyLimits;
use crate::domain::shared::{InstrumentConfig, InstrumentRegistry};

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),

    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Trading mode.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Brokerage connection.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Rate-limited gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Safety gate limits.
    #[serde(default)]
    pub safety: SafetyLimits,
    /// Execution coordinator and pool.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Background reconciliation.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Tradeable instruments.
    #[serde(default)]
    pub instruments: Vec<InstrumentEntry>,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Domain configuration of every listed instrument.
    #[must_use]
    pub fn instrument_configs(&self) -> Vec<InstrumentConfig> {
        self.instruments.iter().map(InstrumentEntry::to_config).collect()
    }

    /// Registry of the listed instruments.
    #[must_use]
    pub fn registry(&self) -> InstrumentRegistry {
        InstrumentRegistry::new(self.instrument_configs())
    }

    /// Parsed metrics listen address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the address does not parse.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.observability.metrics_addr.parse().map_err(|e| {
            ConfigError::ValidationError(format!(
                "observability.metrics_addr '{}': {e}",
                self.observability.metrics_addr
            ))
        })
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax. Unset or empty
/// variables without a default become the empty string.
#[allow(clippy::expect_used)] // Regex is a constant pattern
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` for the first malformed value, or
/// `ConfigError::MissingEnvVar` when a remote mode has no credentials.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: String| -> Result<(), ConfigError> {
        Err(ConfigError::ValidationError(msg))
    };

    if config.environment.mode.is_remote() {
        if config.broker.api_key.is_empty() {
            return Err(ConfigError::MissingEnvVar("broker.api_key".to_string()));
        }
        if config.broker.api_secret.is_empty() {
            return Err(ConfigError::MissingEnvVar("broker.api_secret".to_string()));
        }
    }
    if config.broker.timeout_secs == 0 {
        return invalid("broker.timeout_secs must be positive".to_string());
    }
    if config.broker.simulated.fee_rate.is_sign_negative() {
        return invalid("broker.simulated.fee_rate must not be negative".to_string());
    }

    let gateway = &config.gateway;
    if gateway.calls_per_minute == 0 {
        return invalid("gateway.calls_per_minute must be positive".to_string());
    }
    if gateway.call_timeout_secs == 0 {
        return invalid("gateway.call_timeout_secs must be positive".to_string());
    }
    if gateway.backoff_multiplier < 1.0 {
        return invalid("gateway.backoff_multiplier must be at least 1.0".to_string());
    }
    if !(0.0..=1.0).contains(&gateway.jitter_factor) {
        return invalid("gateway.jitter_factor must be between 0.0 and 1.0".to_string());
    }
    if gateway.initial_backoff_ms > gateway.max_backoff_ms {
        return invalid("gateway.initial_backoff_ms must not exceed max_backoff_ms".to_string());
    }

    config
        .safety
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("safety: {e}")))?;

    let execution = &config.execution;
    if execution.workers == 0 {
        return invalid("execution.workers must be positive".to_string());
    }
    if execution.lock_ttl_secs == 0 {
        return invalid("execution.lock_ttl_secs must be positive".to_string());
    }

    if config.reconciliation.enabled && config.reconciliation.interval_secs == 0 {
        return invalid("reconciliation.interval_secs must be positive".to_string());
    }

    let mut seen = HashSet::new();
    for (index, entry) in config.instruments.iter().enumerate() {
        entry
            .to_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("instruments[{index}]: {e}")))?;
        if !seen.insert(entry.id.as_str()) {
            return invalid(format!("instruments[{index}]: duplicate id '{}'", entry.id));
        }
    }

    if config.observability.metrics_enabled {
        config.metrics_addr()?;
    }

    Ok(())
}
