// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Tranche Engine - Rust Core Library
//!
//! Turns upstream trading decisions into brokerage orders without exceeding
//! the brokerage's request budget, and tracks the resulting positions as
//! ordered tranches.
//!
//! # Architecture
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: pure business logic
//!   - `position_ledger`: tranche positions, FIFO exits, DCA impact, sizing
//!   - `trade_execution`: Trade aggregate, decisions, outcomes, events
//!   - `safety`: the safety gate and its limits
//!
//! - **Application**: use cases and orchestration
//!   - `ports`: `BrokerPort`, `ExchangeGateway`, `DistributedLockPort`, `ClockPort`
//!   - `services`: instrument locks, settlement, reconciliation loop, execution pool
//!   - `use_cases`: `ExecutionCoordinator`, `OrderReconciler`
//!
//! - **Infrastructure**: adapters
//!   - `broker`: REST brokerage adapter and paper broker
//!   - `gateway`: `RateLimitedGateway`
//!   - `persistence`, `lock`, `events`, `clock`: in-process adapters
//!   - `config`: dependency injection container

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Configuration loading and validation.
pub mod config;

/// Metrics and logging setup.
pub mod observability;

// =============================================================================
// Re-exports
// =============================================================================

pub use domain::position_ledger::{Position, PositionStatus, Tranche, TrancheSizer};
pub use domain::safety::{SafetyGate, SafetyLimits};
pub use domain::shared::{InstrumentConfig, InstrumentId, Money, Timestamp, TradeId};
pub use domain::trade_execution::{
    ExecutionOutcome, OrderSide, Temperature, Trade, TradeStatus, TradingDecision,
};

pub use application::ports::{BrokerError, BrokerPort, CallPriority, ExchangeGateway};
pub use application::services::{ExecutionPool, ReconciliationLoop};
pub use application::use_cases::{ExecutionCoordinator, OrderReconciler, ReconciliationReport};

pub use config::{Config, ConfigError, load_config};
pub use infrastructure::broker::{PaperBroker, RestBrokerAdapter};
pub use infrastructure::config::Container;
pub use infrastructure::gateway::RateLimitedGateway;
