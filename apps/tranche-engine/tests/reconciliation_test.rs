//! Pending trades converge through the reconciler.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;
use tranche_engine::application::services::ReconciliationLoop;
use tranche_engine::application::use_cases::ReconciliationReport;
use tranche_engine::domain::position_ledger::PositionRepository;
use tranche_engine::domain::shared::{InstrumentConfig, Money};
use tranche_engine::domain::trade_execution::{
    ExecutionOutcome, OrderSide, Temperature, TradeRepository, TradeStatus, TradingDecision,
};
use tranche_engine::infrastructure::broker::{FillMode, PaperBroker};

use common::{engine, instrument};

fn buy() -> TradingDecision {
    TradingDecision::new(instrument(), OrderSide::Buy, 0.5, Temperature::Warm)
}

fn config() -> InstrumentConfig {
    InstrumentConfig::new(instrument(), Money::new(dec!(100)))
}

#[tokio::test(start_paused = true)]
async fn delayed_fill_settles_once() {
    let e = engine(PaperBroker::new(), dec!(100), config());
    // three immediate polls, then two reconciler passes
    e.broker.set_fill_mode(FillMode::Delayed { polls: 5 });

    let outcome = e.coordinator.execute(buy()).await;
    let ExecutionOutcome::Executed(report) = outcome else {
        panic!("expected executed, got {outcome:?}");
    };
    assert_eq!(report.status, TradeStatus::Pending);
    assert!(
        e.positions
            .find_by_instrument(&instrument())
            .await
            .unwrap()
            .is_none_or(|p| p.is_flat())
    );

    let first = e.reconciler.reconcile_once().await.unwrap();
    assert_eq!(first.checked, 1);
    assert_eq!(first.still_pending, 1);

    let second = e.reconciler.reconcile_once().await.unwrap();
    assert_eq!(second.completed, 1);

    let trade = e.trades.find_by_id(&report.trade_id).await.unwrap().unwrap();
    assert_eq!(trade.status(), TradeStatus::Completed);
    assert!(trade.tranche_ref().is_some());

    let third = e.reconciler.reconcile_once().await.unwrap();
    assert_eq!(third, ReconciliationReport::default());

    let position = e
        .positions
        .find_by_instrument(&instrument())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.tranche_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn loop_settles_in_the_background() {
    let e = engine(PaperBroker::new(), dec!(100), config());
    e.broker.set_fill_mode(FillMode::Delayed { polls: 4 });

    let outcome = e.coordinator.execute(buy()).await;
    assert!(outcome.is_executed());

    let cancel = CancellationToken::new();
    let reconciler = Arc::new(e.reconciler);
    let handle = tokio::spawn(
        ReconciliationLoop::new(Arc::clone(&reconciler), Duration::from_secs(5), cancel.clone())
            .run(),
    );

    tokio::time::sleep(Duration::from_secs(12)).await;
    cancel.cancel();
    let passes = handle.await.unwrap();
    assert!(passes >= 2);

    assert!(e.trades.find_pending().await.unwrap().is_empty());
    let position = e
        .positions
        .find_by_instrument(&instrument())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.tranche_count(), 1);
}
