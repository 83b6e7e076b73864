//! Shared wiring for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tranche_engine::application::ports::NoOpEventPublisher;
use tranche_engine::application::use_cases::{
    ExecutionCoordinator, ExecutionSettings, OrderReconciler,
};
use tranche_engine::domain::shared::{InstrumentConfig, InstrumentId, InstrumentRegistry, Timestamp};
use tranche_engine::infrastructure::broker::PaperBroker;
use tranche_engine::infrastructure::clock::ManualClock;
use tranche_engine::infrastructure::gateway::{GatewaySettings, RateLimitedGateway, RetryPolicy};
use tranche_engine::infrastructure::lock::InMemoryLockStore;
use tranche_engine::infrastructure::persistence::{
    InMemoryPositionRepository, InMemoryTradeRepository,
};

pub type Gateway = RateLimitedGateway<PaperBroker>;
pub type Coordinator = ExecutionCoordinator<
    Gateway,
    InMemoryLockStore,
    InMemoryTradeRepository,
    InMemoryPositionRepository,
    NoOpEventPublisher,
>;
pub type Reconciler = OrderReconciler<
    Gateway,
    InMemoryLockStore,
    InMemoryTradeRepository,
    InMemoryPositionRepository,
    NoOpEventPublisher,
>;

pub struct Engine {
    pub broker: Arc<PaperBroker>,
    pub gateway: Arc<Gateway>,
    pub locks: Arc<InMemoryLockStore>,
    pub trades: Arc<InMemoryTradeRepository>,
    pub positions: Arc<InMemoryPositionRepository>,
    pub clock: Arc<ManualClock>,
    pub coordinator: Arc<Coordinator>,
    pub reconciler: Reconciler,
}

pub fn instrument() -> InstrumentId {
    InstrumentId::new("X-USD")
}

pub fn start() -> Timestamp {
    Timestamp::parse("2026-03-02T12:00:00Z").unwrap()
}

/// Engine around a paper broker quoting X-USD at `price`.
pub fn engine(broker: PaperBroker, price: Decimal, config: InstrumentConfig) -> Engine {
    engine_with(
        broker,
        price,
        config,
        GatewaySettings {
            calls_per_window: 100,
            retry: RetryPolicy::none(),
            ..GatewaySettings::default()
        },
    )
}

/// Like [`engine`], with explicit gateway tunables.
pub fn engine_with(
    broker: PaperBroker,
    price: Decimal,
    config: InstrumentConfig,
    gateway: GatewaySettings,
) -> Engine {
    let broker = Arc::new(broker);
    broker.set_price(&instrument(), price);
    broker.set_balance("USD", Decimal::from(10_000));

    let gateway = Arc::new(RateLimitedGateway::new(Arc::clone(&broker), gateway));
    let locks = Arc::new(InMemoryLockStore::new());
    let trades = Arc::new(InMemoryTradeRepository::new());
    let positions = Arc::new(InMemoryPositionRepository::new());
    let clock = Arc::new(ManualClock::new(start()));
    let registry = Arc::new(InstrumentRegistry::new([config]));
    let events = Arc::new(NoOpEventPublisher);

    let coordinator = ExecutionCoordinator::new(
        Arc::clone(&gateway),
        Arc::clone(&locks),
        Arc::clone(&trades),
        Arc::clone(&positions),
        Arc::clone(&events),
        clock.clone(),
        Arc::clone(&registry),
    )
    .with_settings(ExecutionSettings {
        poll_interval: Duration::from_millis(10),
        ..ExecutionSettings::default()
    });
    let reconciler = OrderReconciler::new(
        Arc::clone(&gateway),
        Arc::clone(&locks),
        Arc::clone(&trades),
        Arc::clone(&positions),
        events,
        clock.clone(),
        registry,
    );

    Engine {
        broker,
        gateway,
        locks,
        trades,
        positions,
        clock,
        coordinator: Arc::new(coordinator),
        reconciler,
    }
}
