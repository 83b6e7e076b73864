//! Prometheus metrics for the tranche engine.
//!
//! Covers gateway traffic, execution outcomes, settlements and
//! reconciliation. Recording is a no-op until [`init_metrics`] installs
//! the exporter, so library code records unconditionally.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for latency measurements (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl MetricsConfig {
    /// Create a new metrics configuration with custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            // Brokerage round trips: 10ms to 30s
            latency_buckets: vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the metrics exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Gateway Metrics
// ============================================================================

/// Record one dispatched brokerage call.
///
/// # Arguments
///
/// * `method` - Gateway method (e.g., "submit_order", "get_ticker")
/// * `priority` - Call priority label
/// * `outcome` - "ok", "rate_limited", "timeout" or "error"
/// * `latency_seconds` - Remote round-trip time in seconds
pub fn record_gateway_call(method: &str, priority: &str, outcome: &str, latency_seconds: f64) {
    counter!(
        "gateway_calls_total",
        "method" => method.to_string(),
        "priority" => priority.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_call_latency_seconds",
        "method" => method.to_string()
    )
    .record(latency_seconds);
}

/// Record a response served from the gateway cache.
pub fn record_cache_hit(method: &str) {
    counter!("gateway_cache_hits_total", "method" => method.to_string()).increment(1);
}

/// Record a retry of a transient gateway failure.
pub fn record_gateway_retry(method: &str) {
    counter!("gateway_retries_total", "method" => method.to_string()).increment(1);
}

/// Record entry into the post-429 cooldown.
pub fn record_rate_limit_cooldown() {
    counter!("gateway_rate_limit_cooldowns_total").increment(1);
}

/// Update the number of calls waiting for budget.
#[allow(clippy::cast_precision_loss)]
pub fn update_queue_depth(depth: usize) {
    gauge!("gateway_queue_depth").set(depth as f64);
}

// ============================================================================
// Execution Metrics
// ============================================================================

/// Record the outcome of one `execute()` call.
///
/// * `outcome` - "executed", "blocked" or "failed"
/// * `kind` - Block or failure kind label, or the trade status when executed
pub fn record_execution_outcome(instrument: &str, outcome: &str, kind: &str) {
    counter!(
        "execution_outcomes_total",
        "instrument" => instrument.to_string(),
        "outcome" => outcome.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a trade reaching a terminal status.
///
/// * `path` - "immediate" or "reconciler"
/// * `status` - "completed" or "failed"
pub fn record_settlement(path: &str, status: &str) {
    counter!(
        "trade_settlements_total",
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Update the count of open positions.
#[allow(clippy::cast_precision_loss)]
pub fn update_open_positions(count: usize) {
    gauge!("open_positions").set(count as f64);
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Record one reconciliation cycle.
pub fn record_reconciliation_cycle(checked: usize, still_pending: usize, duration_seconds: f64) {
    counter!("reconciliation_cycles_total").increment(1);
    counter!("reconciliation_trades_checked_total").increment(checked as u64);
    #[allow(clippy::cast_precision_loss)]
    gauge!("reconciliation_pending_trades").set(still_pending as f64);
    histogram!("reconciliation_cycle_seconds").record(duration_seconds);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9464".parse().unwrap();
        let config = MetricsConfig::with_addr(addr);
        assert_eq!(config.listen_addr.port(), 9464);
        assert!(config.latency_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_recording_without_recorder() {
        // Recording must not panic when no exporter is installed
        record_gateway_call("get_ticker", "high", "ok", 0.120);
        record_cache_hit("get_ticker");
        record_gateway_retry("submit_order");
        record_rate_limit_cooldown();
        update_queue_depth(3);
        record_execution_outcome("ETH-USD", "blocked", "cooldown");
        record_settlement("reconciler", "completed");
        update_open_positions(2);
        record_reconciliation_cycle(4, 1, 0.5);
    }
}
