//! Execute Decision Use Case
//!
//! Turns one upstream trading decision into at most one brokerage order.
//!
//! 1. Advisory gate check with the estimated notional (no lock held).
//! 2. Take the instrument lock; if busy, return `Blocked` immediately.
//! 3. Under the lock: re-read the price, re-check the cooldown, size,
//!    re-run the full gate, check the balance, confirm the lock is still
//!    ours, save the trade `Pending`, submit at CRITICAL.
//! 4. Poll the order a bounded number of times and settle it if terminal;
//!    otherwise leave it for the reconciler.
//!
//! Every path returns an [`ExecutionOutcome`]; nothing here returns `Err`.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::application::ports::{
    CallPriority, ClockPort, DistributedLockPort, EventPublisherPort, ExchangeGateway,
    OrderSnapshot, SubmitOrderRequest,
};
use crate::application::services::{
    InstrumentLocks, Lease, LockRunError, SafetyContext, SettlementOutcome, TradeSettlement,
    record_settlement_outcome,
};
use crate::domain::position_ledger::{Position, PositionRepository, SizingInput, TrancheSizer};
use crate::domain::safety::{SafetyGate, SafetyRequest, SafetySnapshot};
use crate::domain::shared::{InstrumentConfig, InstrumentRegistry, Money, RepositoryError};
use crate::domain::trade_execution::events::{TradeBlocked, TradeSubmitted};
use crate::domain::trade_execution::{
    BlockKind, BlockReason, ExecutionOutcome, ExecutionReport, FailureKind, FailureReason,
    NewTrade, OrderSide, Trade, TradeEvent, TradeRepository, TradeStatus, TradingDecision,
};
use crate::observability;

/// Execution tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// TTL of the instrument lock.
    pub lock_ttl: Duration,
    /// Status checks after submission before handing off to the reconciler.
    pub immediate_poll_attempts: u32,
    /// Sleep before each status check.
    pub poll_interval: Duration,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(30),
            immediate_poll_attempts: 3,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Orchestrates one execution attempt per call.
pub struct ExecutionCoordinator<G, L, T, P, E>
where
    G: ExchangeGateway,
    L: DistributedLockPort,
    T: TradeRepository,
    P: PositionRepository,
    E: EventPublisherPort,
{
    gateway: Arc<G>,
    locks: InstrumentLocks<L>,
    trades: Arc<T>,
    positions: Arc<P>,
    events: Arc<E>,
    clock: Arc<dyn ClockPort>,
    registry: Arc<InstrumentRegistry>,
    context: SafetyContext<T, P>,
    settlement: TradeSettlement<T, P, E>,
    gate: SafetyGate,
    sizer: TrancheSizer,
    settings: ExecutionSettings,
}

impl<G, L, T, P, E> ExecutionCoordinator<G, L, T, P, E>
where
    G: ExchangeGateway,
    L: DistributedLockPort,
    T: TradeRepository,
    P: PositionRepository,
    E: EventPublisherPort,
{
    /// Coordinator with default gate limits, sizing and settings.
    pub fn new(
        gateway: Arc<G>,
        lock_store: Arc<L>,
        trades: Arc<T>,
        positions: Arc<P>,
        events: Arc<E>,
        clock: Arc<dyn ClockPort>,
        registry: Arc<InstrumentRegistry>,
    ) -> Self {
        let settings = ExecutionSettings::default();
        Self {
            gateway,
            locks: InstrumentLocks::new(lock_store, settings.lock_ttl),
            context: SafetyContext::new(Arc::clone(&trades), Arc::clone(&positions)),
            settlement: TradeSettlement::new(
                Arc::clone(&trades),
                Arc::clone(&positions),
                Arc::clone(&events),
                Arc::clone(&registry),
            ),
            trades,
            positions,
            events,
            clock,
            registry,
            gate: SafetyGate::default(),
            sizer: TrancheSizer::default(),
            settings,
        }
    }

    /// Replace the safety gate.
    #[must_use]
    pub fn with_gate(mut self, gate: SafetyGate) -> Self {
        self.gate = gate;
        self
    }

    /// Replace the sizer.
    #[must_use]
    pub fn with_sizer(mut self, sizer: TrancheSizer) -> Self {
        self.sizer = sizer;
        self
    }

    /// Replace the execution settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.locks = InstrumentLocks::new(self.locks.store(), settings.lock_ttl);
        self.settings = settings;
        self
    }

    /// Execute one decision.
    pub async fn execute(&self, decision: TradingDecision) -> ExecutionOutcome {
        let outcome = self.run(&decision).await;

        match &outcome {
            ExecutionOutcome::Executed(report) => {
                tracing::info!(
                    instrument = %decision.instrument,
                    side = %decision.side,
                    trade_id = %report.trade_id,
                    notional = %report.notional,
                    status = %report.status,
                    "Execution submitted"
                );
                observability::record_execution_outcome(
                    decision.instrument.as_str(),
                    outcome.label(),
                    &report.status.to_string().to_lowercase(),
                );
            }
            ExecutionOutcome::Blocked(reason) => {
                tracing::info!(
                    instrument = %decision.instrument,
                    side = %decision.side,
                    kind = reason.kind.as_label(),
                    reasons = %reason,
                    "Execution blocked"
                );
                observability::record_execution_outcome(
                    decision.instrument.as_str(),
                    outcome.label(),
                    reason.kind.as_label(),
                );
                self.publish_blocked(&decision, reason).await;
            }
            ExecutionOutcome::Failed(failure) => {
                tracing::error!(
                    instrument = %decision.instrument,
                    side = %decision.side,
                    kind = failure.kind.as_label(),
                    trade_id = ?failure.trade_id,
                    message = %failure.message,
                    "Execution failed"
                );
                observability::record_execution_outcome(
                    decision.instrument.as_str(),
                    outcome.label(),
                    failure.kind.as_label(),
                );
            }
        }

        outcome
    }

    async fn run(&self, decision: &TradingDecision) -> ExecutionOutcome {
        if let Err(e) = decision.validate() {
            return ExecutionOutcome::failed(FailureKind::InvalidDecision, e.to_string());
        }
        let Some(config) = self.registry.get(&decision.instrument) else {
            return ExecutionOutcome::failed(
                FailureKind::Configuration,
                format!("unknown instrument {}", decision.instrument),
            );
        };
        if let Err(e) = config.validate() {
            return ExecutionOutcome::failed(FailureKind::Configuration, e.to_string());
        }

        let price = match self.current_price(decision).await {
            Ok(price) => price,
            Err(outcome) => return outcome,
        };

        // Advisory: re-run under the lock before anything is committed
        let (snapshot, position) = match self.load_state(config, price).await {
            Ok(state) => state,
            Err(outcome) => return outcome,
        };
        let notional = self.notional_for(decision, config, &position, price);
        let request = Self::request(decision, config, notional);
        let advisory = self.gate.validate(&request, &snapshot);
        if !advisory.allowed() {
            return ExecutionOutcome::Blocked(BlockReason {
                kind: BlockKind::Policy,
                reasons: advisory.reasons(),
            });
        }

        match self
            .locks
            .run(&decision.instrument, |lease| {
                self.execute_locked(decision, config, lease)
            })
            .await
        {
            Ok(Some(outcome)) => outcome,
            Ok(None) => ExecutionOutcome::blocked(
                BlockKind::ConcurrentExecution,
                "concurrent execution in progress",
            ),
            Err(LockRunError::Store(e)) => {
                ExecutionOutcome::failed(FailureKind::Infrastructure, e.to_string())
            }
            Err(LockRunError::Panicked(message)) => {
                ExecutionOutcome::failed(FailureKind::Internal, message)
            }
        }
    }

    async fn execute_locked(
        &self,
        decision: &TradingDecision,
        config: &InstrumentConfig,
        lease: Lease<L>,
    ) -> ExecutionOutcome {
        // Gate and commit use the price as of the lock, not the advisory one
        let price = match self.current_price(decision).await {
            Ok(price) => price,
            Err(outcome) => return outcome,
        };
        let (snapshot, position) = match self.load_state(config, price).await {
            Ok(state) => state,
            Err(outcome) => return outcome,
        };

        // Another caller may have traded between the advisory check and the lock
        let notional = self.notional_for(decision, config, &position, price);
        let request = Self::request(decision, config, notional);
        if let Some(violation) = SafetyGate::check_cooldown(&request, &snapshot) {
            return ExecutionOutcome::blocked(BlockKind::Cooldown, violation.message);
        }
        let verdict = self.gate.validate(&request, &snapshot);
        if !verdict.allowed() {
            return ExecutionOutcome::Blocked(BlockReason {
                kind: BlockKind::Policy,
                reasons: verdict.reasons(),
            });
        }

        if let Some(outcome) = self.check_balance(config, decision.side, notional, price).await {
            return outcome;
        }

        // Lookups above can wait out rate limits; nothing below waits before submission
        if !lease.still_held().await {
            tracing::warn!(
                instrument = %decision.instrument,
                key = lease.key(),
                "Instrument lock lapsed before submission"
            );
            return ExecutionOutcome::blocked(
                BlockKind::ConcurrentExecution,
                "instrument lock lapsed before submission",
            );
        }

        let now = self.clock.now();
        let mut trade = Trade::pending(
            NewTrade {
                instrument: decision.instrument.clone(),
                side: decision.side,
                requested_notional: notional,
                reference_price: price,
                confidence: decision.confidence,
                temperature: decision.temperature,
            },
            now,
        );
        if let Err(e) = self.trades.save(&trade).await {
            return ExecutionOutcome::failed(FailureKind::Infrastructure, e.to_string());
        }

        let submission = self
            .gateway
            .submit_order(
                SubmitOrderRequest {
                    client_order_id: trade.id().clone(),
                    instrument: decision.instrument.clone(),
                    side: decision.side,
                    notional,
                },
                CallPriority::Critical,
            )
            .await;

        let snapshot = match submission {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let message = format!("submission failed: {e}");
                let at = self.clock.now();
                if let Err(save_error) = self
                    .settlement
                    .fail(&mut trade, FailureKind::Submission, message.clone(), at)
                    .await
                {
                    tracing::error!(
                        trade_id = %trade.id(),
                        error = %save_error,
                        "Failed to persist submission failure"
                    );
                }
                return Self::failure(&trade, FailureKind::Submission, message);
            }
        };

        if let Err(e) = self.record_submission(&mut trade, &snapshot).await {
            tracing::error!(
                trade_id = %trade.id(),
                external_order_id = %snapshot.external_order_id,
                instrument = %trade.instrument(),
                error = %e,
                "Order placed but its external id could not be persisted"
            );
            return Self::failure(
                &trade,
                FailureKind::Infrastructure,
                format!(
                    "order {} placed but not recorded: {e}",
                    snapshot.external_order_id
                ),
            );
        }
        self.settle_immediately(&mut trade, snapshot).await
    }

    async fn current_price(
        &self,
        decision: &TradingDecision,
    ) -> Result<Decimal, ExecutionOutcome> {
        self.gateway
            .get_ticker(&decision.instrument, CallPriority::High)
            .await
            .map(|ticker| ticker.price)
            .map_err(|e| {
                ExecutionOutcome::failed(
                    FailureKind::MarketData,
                    format!("ticker lookup failed: {e}"),
                )
            })
    }

    /// Link the order id, persist it and announce the submission.
    async fn record_submission(
        &self,
        trade: &mut Trade,
        snapshot: &OrderSnapshot,
    ) -> Result<(), RepositoryError> {
        let at = self.clock.now();
        if trade
            .attach_external_order(snapshot.external_order_id.clone(), at)
            .is_ok()
        {
            self.trades.save(trade).await?;
        }

        tracing::info!(
            trade_id = %trade.id(),
            external_order_id = %snapshot.external_order_id,
            instrument = %trade.instrument(),
            side = %trade.side(),
            notional = %trade.requested_notional(),
            remote_state = %snapshot.state,
            "Order submitted"
        );

        let event = TradeEvent::Submitted(TradeSubmitted {
            trade_id: trade.id().clone(),
            external_order_id: snapshot.external_order_id.clone(),
            instrument: trade.instrument().clone(),
            side: trade.side(),
            notional: trade.requested_notional(),
            occurred_at: at,
        });
        if let Err(e) = self.events.publish_trade_event(event).await {
            tracing::warn!(error = %e, "Failed to publish submission event");
        }
        Ok(())
    }

    /// Apply the submission response, then poll a few times if unresolved.
    async fn settle_immediately(
        &self,
        trade: &mut Trade,
        mut snapshot: OrderSnapshot,
    ) -> ExecutionOutcome {
        let mut polls = 0;
        loop {
            let outcome = match self.settlement.apply(trade, &snapshot, self.clock.now()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        trade_id = %trade.id(),
                        error = %e,
                        "Immediate settlement failed, leaving trade for reconciliation"
                    );
                    return Self::handed_off(trade);
                }
            };
            record_settlement_outcome("immediate", &outcome);

            match &outcome {
                SettlementOutcome::StillPending => {}
                SettlementOutcome::Failed { kind, reason } => {
                    return Self::failure(trade, *kind, reason.clone());
                }
                SettlementOutcome::Completed { .. } | SettlementOutcome::Unchanged => {
                    return Self::executed(trade, Some(&outcome));
                }
            }

            if polls >= self.settings.immediate_poll_attempts {
                tracing::info!(
                    trade_id = %trade.id(),
                    polls,
                    "Order unresolved after immediate polling, handing off to reconciler"
                );
                return Self::executed(trade, None);
            }
            polls += 1;
            tokio::time::sleep(self.settings.poll_interval).await;

            let Some(order_id) = trade.external_order_id().cloned() else {
                return Self::executed(trade, None);
            };
            match self.gateway.get_order(&order_id, CallPriority::High).await {
                Ok(next) => snapshot = next,
                Err(e) => {
                    tracing::warn!(
                        trade_id = %trade.id(),
                        external_order_id = %order_id,
                        error = %e,
                        "Order status unavailable, leaving trade for reconciliation"
                    );
                    return Self::executed(trade, None);
                }
            }
        }
    }

    /// `Blocked(InsufficientBalance)` or `Failed(MarketData)` when the
    /// balance cannot cover the order.
    async fn check_balance(
        &self,
        config: &InstrumentConfig,
        side: OrderSide,
        notional: Money,
        price: Decimal,
    ) -> Option<ExecutionOutcome> {
        let Some((base, quote)) = config.id.assets() else {
            return Some(ExecutionOutcome::failed(
                FailureKind::Configuration,
                format!("'{}' is not in BASE-QUOTE form", config.id),
            ));
        };
        let (asset, required) = match side {
            OrderSide::Buy => (quote, notional.amount()),
            OrderSide::Sell => (base, notional.amount() / price),
        };

        match self.gateway.get_balance(asset, CallPriority::High).await {
            Ok(available) if available >= required => None,
            Ok(available) => Some(ExecutionOutcome::blocked(
                BlockKind::InsufficientBalance,
                format!("insufficient balance: {available} {asset} available, {required} required"),
            )),
            Err(e) => Some(ExecutionOutcome::failed(
                FailureKind::MarketData,
                format!("balance lookup failed: {e}"),
            )),
        }
    }

    async fn load_state(
        &self,
        config: &InstrumentConfig,
        price: Decimal,
    ) -> Result<(SafetySnapshot, Position), ExecutionOutcome> {
        let infrastructure = |e: RepositoryError| {
            ExecutionOutcome::failed(FailureKind::Infrastructure, e.to_string())
        };
        let snapshot = self
            .context
            .snapshot(&config.id, price, self.clock.now())
            .await
            .map_err(infrastructure)?;
        let mut position = self
            .positions
            .find_by_instrument(&config.id)
            .await
            .map_err(infrastructure)?
            .unwrap_or_else(|| Position::new(config.id.clone(), config.max_tranches));
        position.set_max_tranches(config.max_tranches);
        Ok((snapshot, position))
    }

    fn notional_for(
        &self,
        decision: &TradingDecision,
        config: &InstrumentConfig,
        position: &Position,
        price: Decimal,
    ) -> Money {
        decision.target_notional.unwrap_or_else(|| {
            self.sizer
                .size(&SizingInput {
                    config,
                    position,
                    side: decision.side,
                    price,
                    temperature: decision.temperature,
                    confidence: decision.confidence,
                })
                .notional
        })
    }

    fn request<'a>(
        decision: &TradingDecision,
        config: &'a InstrumentConfig,
        notional: Money,
    ) -> SafetyRequest<'a> {
        SafetyRequest {
            config,
            side: decision.side,
            notional,
            temperature: decision.temperature,
        }
    }

    fn executed(trade: &Trade, settled: Option<&SettlementOutcome>) -> ExecutionOutcome {
        let (filled_price, tranche_ref, realized_pnl) = match settled {
            Some(SettlementOutcome::Completed {
                fill_price,
                tranche_ref,
                realized_pnl,
            }) => (Some(*fill_price), tranche_ref.clone(), *realized_pnl),
            _ => (
                trade.filled_price(),
                trade.tranche_ref().cloned(),
                trade.realized_pnl(),
            ),
        };
        ExecutionOutcome::Executed(ExecutionReport {
            trade_id: trade.id().clone(),
            instrument: trade.instrument().clone(),
            side: trade.side(),
            notional: trade.requested_notional(),
            status: if trade.status() == TradeStatus::Completed {
                TradeStatus::Completed
            } else {
                TradeStatus::Pending
            },
            filled_price,
            tranche_ref,
            realized_pnl,
        })
    }

    /// Submitted, but what was persisted is still `Pending`.
    fn handed_off(trade: &Trade) -> ExecutionOutcome {
        ExecutionOutcome::Executed(ExecutionReport {
            trade_id: trade.id().clone(),
            instrument: trade.instrument().clone(),
            side: trade.side(),
            notional: trade.requested_notional(),
            status: TradeStatus::Pending,
            filled_price: None,
            tranche_ref: None,
            realized_pnl: None,
        })
    }

    fn failure(trade: &Trade, kind: FailureKind, message: String) -> ExecutionOutcome {
        ExecutionOutcome::Failed(FailureReason {
            kind,
            message,
            trade_id: Some(trade.id().clone()),
        })
    }

    async fn publish_blocked(&self, decision: &TradingDecision, reason: &BlockReason) {
        let event = TradeEvent::Blocked(TradeBlocked {
            instrument: decision.instrument.clone(),
            side: decision.side,
            kind: reason.kind,
            reasons: reason.reasons.clone(),
            occurred_at: self.clock.now(),
        });
        if let Err(e) = self.events.publish_trade_event(event).await {
            tracing::warn!(error = %e, "Failed to publish blocked event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BrokerError, LockError, LockToken, NoOpEventPublisher};
    use crate::domain::shared::{InstrumentId, Timestamp};
    use crate::domain::trade_execution::Temperature;
    use crate::infrastructure::broker::{FillMode, PaperBroker};
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::gateway::{GatewaySettings, RateLimitedGateway, RetryPolicy};
    use crate::infrastructure::lock::InMemoryLockStore;
    use crate::infrastructure::persistence::{InMemoryPositionRepository, InMemoryTradeRepository};
    use rust_decimal_macros::dec;

    type Coordinator<T = InMemoryTradeRepository> = ExecutionCoordinator<
        RateLimitedGateway<PaperBroker>,
        InMemoryLockStore,
        T,
        InMemoryPositionRepository,
        NoOpEventPublisher,
    >;

    struct Harness<T: TradeRepository = InMemoryTradeRepository> {
        broker: Arc<PaperBroker>,
        locks: Arc<InMemoryLockStore>,
        trades: Arc<T>,
        positions: Arc<InMemoryPositionRepository>,
        coordinator: Coordinator<T>,
    }

    fn eth() -> InstrumentId {
        InstrumentId::new("ETH-USD")
    }

    fn gateway_settings() -> GatewaySettings {
        GatewaySettings {
            calls_per_window: 100,
            retry: RetryPolicy::none(),
            ..GatewaySettings::default()
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(InMemoryTradeRepository::new()), gateway_settings())
    }

    fn harness_with<T: TradeRepository>(trades: Arc<T>, settings: GatewaySettings) -> Harness<T> {
        let broker = Arc::new(PaperBroker::new());
        broker.set_price(&eth(), dec!(2000));
        broker.set_balance("USD", dec!(10000));
        let gateway = Arc::new(RateLimitedGateway::new(Arc::clone(&broker), settings));
        let locks = Arc::new(InMemoryLockStore::new());
        let positions = Arc::new(InMemoryPositionRepository::new());
        let clock = Arc::new(ManualClock::new(
            Timestamp::parse("2026-03-02T12:00:00Z").unwrap(),
        ));
        let registry = Arc::new(InstrumentRegistry::new([InstrumentConfig::new(
            eth(),
            Money::new(dec!(100)),
        )]));
        let coordinator = ExecutionCoordinator::new(
            gateway,
            Arc::clone(&locks),
            Arc::clone(&trades),
            Arc::clone(&positions),
            Arc::new(NoOpEventPublisher),
            clock,
            registry,
        )
        .with_settings(ExecutionSettings {
            poll_interval: Duration::from_millis(10),
            ..ExecutionSettings::default()
        });
        Harness {
            broker,
            locks,
            trades,
            positions,
            coordinator,
        }
    }

    fn buy() -> TradingDecision {
        TradingDecision::new(eth(), OrderSide::Buy, 0.5, Temperature::Warm)
    }

    #[tokio::test]
    async fn instant_fill_executes_and_opens_tranche() {
        let h = harness();
        let outcome = h.coordinator.execute(buy()).await;

        let ExecutionOutcome::Executed(report) = outcome else {
            panic!("expected executed, got {outcome:?}");
        };
        assert_eq!(report.status, TradeStatus::Completed);
        assert_eq!(report.notional, Money::new(dec!(100)));
        assert_eq!(report.filled_price, Some(dec!(2000)));
        assert!(report.tranche_ref.is_some());

        let position = h.positions.find_by_instrument(&eth()).await.unwrap().unwrap();
        assert_eq!(position.tranche_count(), 1);
        assert!(!h.locks.is_held("execution:ETH-USD"));
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_order_is_left_pending() {
        let h = harness();
        h.broker.set_fill_mode(FillMode::Delayed { polls: 10 });

        let outcome = h.coordinator.execute(buy()).await;
        let ExecutionOutcome::Executed(report) = outcome else {
            panic!("expected executed, got {outcome:?}");
        };
        assert_eq!(report.status, TradeStatus::Pending);
        assert_eq!(h.broker.call_count("get_order"), 3);

        let pending = h.trades.find_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].external_order_id().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn fill_seen_on_poll_completes() {
        let h = harness();
        h.broker.set_fill_mode(FillMode::Delayed { polls: 2 });

        let outcome = h.coordinator.execute(buy()).await;
        let ExecutionOutcome::Executed(report) = outcome else {
            panic!("expected executed, got {outcome:?}");
        };
        assert_eq!(report.status, TradeStatus::Completed);
        assert_eq!(h.broker.call_count("get_order"), 2);
    }

    #[tokio::test]
    async fn rejection_fails_trade() {
        let h = harness();
        h.broker.set_fill_mode(FillMode::Reject);

        let outcome = h.coordinator.execute(buy()).await;
        let ExecutionOutcome::Failed(failure) = outcome else {
            panic!("expected failed, got {outcome:?}");
        };
        assert_eq!(failure.kind, FailureKind::Rejected);
        let trade_id = failure.trade_id.unwrap();
        let trade = h.trades.find_by_id(&trade_id).await.unwrap().unwrap();
        assert_eq!(trade.status(), TradeStatus::Failed);
        assert!(h.positions.find_by_instrument(&eth()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn submission_error_is_failed_submission() {
        let h = harness();
        h.broker.inject_failure_for(
            "submit_order",
            BrokerError::OrderRejected {
                reason: "insufficient buying power".to_string(),
            },
        );

        let outcome = h.coordinator.execute(buy()).await;
        let ExecutionOutcome::Failed(failure) = outcome else {
            panic!("expected failed, got {outcome:?}");
        };
        assert_eq!(failure.kind, FailureKind::Submission);
        let trade = h
            .trades
            .find_by_id(&failure.trade_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trade.status(), TradeStatus::Failed);
        assert!(trade.external_order_id().is_none());
    }

    #[tokio::test]
    async fn insufficient_balance_blocks() {
        let h = harness();
        h.broker.set_balance("USD", dec!(20));

        let outcome = h.coordinator.execute(buy()).await;
        let ExecutionOutcome::Blocked(reason) = outcome else {
            panic!("expected blocked, got {outcome:?}");
        };
        assert_eq!(reason.kind, BlockKind::InsufficientBalance);
        assert!(reason.mentions("insufficient balance"));
        assert_eq!(h.broker.call_count("submit_order"), 0);
    }

    #[tokio::test]
    async fn held_lock_blocks_as_concurrent() {
        let h = harness();
        h.locks
            .acquire("execution:ETH-USD", Duration::from_secs(30))
            .await
            .unwrap();

        let outcome = h.coordinator.execute(buy()).await;
        let ExecutionOutcome::Blocked(reason) = outcome else {
            panic!("expected blocked, got {outcome:?}");
        };
        assert_eq!(reason.kind, BlockKind::ConcurrentExecution);
        assert_eq!(reason.reasons, vec!["concurrent execution in progress"]);
    }

    #[tokio::test]
    async fn unknown_instrument_fails_before_any_call() {
        let h = harness();
        let decision =
            TradingDecision::new(InstrumentId::new("DOGE-USD"), OrderSide::Buy, 0.5, Temperature::Hot);

        let outcome = h.coordinator.execute(decision).await;
        let ExecutionOutcome::Failed(failure) = outcome else {
            panic!("expected failed, got {outcome:?}");
        };
        assert_eq!(failure.kind, FailureKind::Configuration);
        assert!(h.broker.calls().is_empty());
    }

    #[tokio::test]
    async fn frozen_temperature_is_policy_blocked() {
        let h = harness();
        let decision = TradingDecision::new(eth(), OrderSide::Buy, 0.9, Temperature::Frozen);

        let outcome = h.coordinator.execute(decision).await;
        let ExecutionOutcome::Blocked(reason) = outcome else {
            panic!("expected blocked, got {outcome:?}");
        };
        assert_eq!(reason.kind, BlockKind::Policy);
        assert!(reason.mentions("temperature"));
    }

    #[tokio::test]
    async fn ticker_failure_is_market_data() {
        let h = harness();
        h.broker.inject_failure(BrokerError::AuthenticationFailed);

        let outcome = h.coordinator.execute(buy()).await;
        let ExecutionOutcome::Failed(failure) = outcome else {
            panic!("expected failed, got {outcome:?}");
        };
        assert_eq!(failure.kind, FailureKind::MarketData);
    }

    #[tokio::test]
    async fn price_is_read_again_under_the_lock() {
        let h = harness_with(
            Arc::new(InMemoryTradeRepository::new()),
            GatewaySettings {
                cache_ttl: Duration::ZERO,
                ..gateway_settings()
            },
        );

        let outcome = h.coordinator.execute(buy()).await;
        assert!(outcome.is_executed(), "unexpected outcome: {outcome:?}");
        assert_eq!(h.broker.call_count("get_ticker"), 2);
    }

    /// Trade store that accepts a fixed number of saves, then refuses.
    struct LimitedTrades {
        inner: InMemoryTradeRepository,
        saves_left: std::sync::atomic::AtomicUsize,
    }

    impl LimitedTrades {
        fn new(saves: usize) -> Self {
            Self {
                inner: InMemoryTradeRepository::new(),
                saves_left: std::sync::atomic::AtomicUsize::new(saves),
            }
        }
    }

    #[async_trait::async_trait]
    impl TradeRepository for LimitedTrades {
        async fn save(&self, trade: &Trade) -> Result<(), RepositoryError> {
            use std::sync::atomic::Ordering;
            self.saves_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .map_err(|_| RepositoryError::Unavailable("store down".to_string()))?;
            self.inner.save(trade).await
        }

        async fn find_by_id(
            &self,
            id: &crate::domain::shared::TradeId,
        ) -> Result<Option<Trade>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_instrument(
            &self,
            instrument: &InstrumentId,
        ) -> Result<Vec<Trade>, RepositoryError> {
            self.inner.find_by_instrument(instrument).await
        }

        async fn find_pending(&self) -> Result<Vec<Trade>, RepositoryError> {
            self.inner.find_pending().await
        }

        async fn find_since(&self, since: Timestamp) -> Result<Vec<Trade>, RepositoryError> {
            self.inner.find_since(since).await
        }
    }

    #[tokio::test]
    async fn unrecorded_order_id_is_an_infrastructure_failure() {
        // The pending row is written, the row carrying the order id is not
        let h = harness_with(Arc::new(LimitedTrades::new(1)), gateway_settings());

        let outcome = h.coordinator.execute(buy()).await;
        let ExecutionOutcome::Failed(failure) = outcome else {
            panic!("expected failed, got {outcome:?}");
        };
        assert_eq!(failure.kind, FailureKind::Infrastructure);
        assert!(failure.message.contains("placed but not recorded"));
        assert!(failure.trade_id.is_some());
        assert_eq!(h.broker.call_count("submit_order"), 1);
        assert_eq!(h.broker.call_count("get_order"), 0);
        assert!(!h.locks.is_held("execution:ETH-USD"));
    }

    /// Lock store whose holders can never renew.
    #[derive(Default)]
    struct LapsingLocks(InMemoryLockStore);

    #[async_trait::async_trait]
    impl DistributedLockPort for LapsingLocks {
        async fn acquire(
            &self,
            key: &str,
            ttl: Duration,
        ) -> Result<Option<LockToken>, LockError> {
            self.0.acquire(key, ttl).await
        }

        async fn extend(
            &self,
            _key: &str,
            _token: &LockToken,
            _ttl: Duration,
        ) -> Result<bool, LockError> {
            Ok(false)
        }

        async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError> {
            self.0.release(key, token).await
        }
    }

    #[tokio::test]
    async fn lapsed_lock_blocks_before_anything_is_committed() {
        let broker = Arc::new(PaperBroker::new());
        broker.set_price(&eth(), dec!(2000));
        broker.set_balance("USD", dec!(10000));
        let trades = Arc::new(InMemoryTradeRepository::new());
        let coordinator = ExecutionCoordinator::new(
            Arc::new(RateLimitedGateway::new(Arc::clone(&broker), gateway_settings())),
            Arc::new(LapsingLocks::default()),
            Arc::clone(&trades),
            Arc::new(InMemoryPositionRepository::new()),
            Arc::new(NoOpEventPublisher),
            Arc::new(ManualClock::new(
                Timestamp::parse("2026-03-02T12:00:00Z").unwrap(),
            )),
            Arc::new(InstrumentRegistry::new([InstrumentConfig::new(
                eth(),
                Money::new(dec!(100)),
            )])),
        );

        let outcome = coordinator.execute(buy()).await;
        let ExecutionOutcome::Blocked(reason) = outcome else {
            panic!("expected blocked, got {outcome:?}");
        };
        assert_eq!(reason.kind, BlockKind::ConcurrentExecution);
        assert_eq!(reason.reasons, vec!["instrument lock lapsed before submission"]);
        assert_eq!(broker.call_count("submit_order"), 0);
        assert!(trades.find_by_instrument(&eth()).await.unwrap().is_empty());
    }
}
