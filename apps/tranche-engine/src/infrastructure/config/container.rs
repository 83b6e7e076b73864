//! Dependency Injection Container
//!
//! Builds every service from a loaded [`Config`] and a brokerage adapter.
//! Nothing is global: each component receives its collaborators here.

use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{BrokerError, BrokerPort, ClockPort};
use crate::application::services::ExecutionPool;
use crate::application::use_cases::{ExecutionCoordinator, OrderReconciler};
use crate::config::{Config, SimulatedBrokerConfig};
use crate::domain::position_ledger::TrancheSizer;
use crate::domain::safety::SafetyGate;
use crate::domain::shared::{InstrumentId, InstrumentRegistry};
use crate::infrastructure::broker::{PaperBroker, RestBrokerAdapter};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::events::TracingEventPublisher;
use crate::infrastructure::gateway::RateLimitedGateway;
use crate::infrastructure::lock::InMemoryLockStore;
use crate::infrastructure::persistence::{InMemoryPositionRepository, InMemoryTradeRepository};

/// Coordinator wired with the in-process adapters.
pub type Coordinator<B> = ExecutionCoordinator<
    RateLimitedGateway<B>,
    InMemoryLockStore,
    InMemoryTradeRepository,
    InMemoryPositionRepository,
    TracingEventPublisher,
>;

/// Reconciler wired with the in-process adapters.
pub type Reconciler<B> = OrderReconciler<
    RateLimitedGateway<B>,
    InMemoryLockStore,
    InMemoryTradeRepository,
    InMemoryPositionRepository,
    TracingEventPublisher,
>;

/// Execution pool over [`Coordinator`].
pub type Pool<B> = ExecutionPool<
    RateLimitedGateway<B>,
    InMemoryLockStore,
    InMemoryTradeRepository,
    InMemoryPositionRepository,
    TracingEventPublisher,
>;

/// Dependency injection container.
///
/// One gateway, lock store and pair of repositories are shared by the
/// coordinator and the reconciler so they see the same budget, locks and ledger.
pub struct Container<B>
where
    B: BrokerPort + 'static,
{
    config: Config,
    gateway: Arc<RateLimitedGateway<B>>,
    locks: Arc<InMemoryLockStore>,
    trades: Arc<InMemoryTradeRepository>,
    positions: Arc<InMemoryPositionRepository>,
    events: Arc<TracingEventPublisher>,
    clock: Arc<dyn ClockPort>,
    registry: Arc<InstrumentRegistry>,
}

impl<B> Container<B>
where
    B: BrokerPort + 'static,
{
    /// Wire every component from `config` around `broker`, using the system clock.
    pub fn new(config: Config, broker: Arc<B>) -> Self {
        let gateway = Arc::new(RateLimitedGateway::new(broker, config.gateway.to_settings()));
        let registry = Arc::new(config.registry());
        Self {
            config,
            gateway,
            locks: Arc::new(InMemoryLockStore::new()),
            trades: Arc::new(InMemoryTradeRepository::new()),
            positions: Arc::new(InMemoryPositionRepository::new()),
            events: Arc::new(TracingEventPublisher),
            clock: Arc::new(SystemClock),
            registry,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockPort>) -> Self {
        self.clock = clock;
        self
    }

    /// Loaded configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Get the gateway.
    pub fn gateway(&self) -> Arc<RateLimitedGateway<B>> {
        Arc::clone(&self.gateway)
    }

    /// Get the trade repository.
    pub fn trades(&self) -> Arc<InMemoryTradeRepository> {
        Arc::clone(&self.trades)
    }

    /// Get the position repository.
    pub fn positions(&self) -> Arc<InMemoryPositionRepository> {
        Arc::clone(&self.positions)
    }

    /// Get the instrument registry.
    pub fn registry(&self) -> Arc<InstrumentRegistry> {
        Arc::clone(&self.registry)
    }

    /// Create an `ExecutionCoordinator`.
    pub fn execution_coordinator(&self) -> Coordinator<B> {
        ExecutionCoordinator::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.locks),
            Arc::clone(&self.trades),
            Arc::clone(&self.positions),
            Arc::clone(&self.events),
            Arc::clone(&self.clock),
            Arc::clone(&self.registry),
        )
        .with_gate(SafetyGate::new(self.config.safety.clone()))
        .with_sizer(TrancheSizer::new(self.config.execution.sizing.clone()))
        .with_settings(self.config.execution.to_settings())
    }

    /// Create an `ExecutionPool` around a fresh coordinator.
    pub fn execution_pool(&self) -> Pool<B> {
        ExecutionPool::new(
            Arc::new(self.execution_coordinator()),
            self.config.execution.workers,
        )
    }

    /// Create an `OrderReconciler`.
    pub fn order_reconciler(&self) -> Reconciler<B> {
        OrderReconciler::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.locks),
            Arc::clone(&self.trades),
            Arc::clone(&self.positions),
            Arc::clone(&self.events),
            Arc::clone(&self.clock),
            Arc::clone(&self.registry),
        )
        .with_lock_ttl(Duration::from_secs(self.config.execution.lock_ttl_secs))
    }
}

/// Paper broker seeded with the configured prices and balances.
pub fn build_paper_broker(config: &SimulatedBrokerConfig) -> PaperBroker {
    let mut broker = PaperBroker::new().with_fee_rate(config.fee_rate);
    if config.latency_ms > 0 {
        broker = broker.with_latency(Duration::from_millis(config.latency_ms));
    }
    for (instrument, price) in &config.prices {
        broker.set_price(&InstrumentId::new(instrument.clone()), *price);
    }
    for (asset, amount) in &config.balances {
        broker.set_balance(asset, *amount);
    }
    broker
}

/// REST adapter for the configured remote mode.
///
/// # Errors
///
/// Returns `BrokerError::AuthenticationFailed` when credentials are empty.
pub fn build_rest_broker(config: &Config) -> Result<RestBrokerAdapter, BrokerError> {
    RestBrokerAdapter::new(config.broker.rest_config(config.environment.mode))
}
