//! Observability module for metrics and logging.
//!
//! This module provides instrumentation for the tranche engine:
//! Prometheus metrics export and `tracing` subscriber setup.

mod logging;
mod metrics;

pub use logging::{LoggingError, init_logging};
pub use metrics::{
    MetricsConfig, MetricsError, init_metrics, record_cache_hit, record_execution_outcome,
    record_gateway_call, record_gateway_retry, record_rate_limit_cooldown,
    record_reconciliation_cycle, record_settlement, update_open_positions, update_queue_depth,
};
