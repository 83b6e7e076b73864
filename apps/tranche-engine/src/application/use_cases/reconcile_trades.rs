//! Reconcile Trades Use Case
//!
//! Converges `Pending` trades with the brokerage's order status. Each trade
//! is settled under its instrument lock through the same
//! [`TradeSettlement`] the coordinator uses, so a trade never has two
//! writers.

use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{
    CallPriority, ClockPort, DistributedLockPort, EventPublisherPort, ExchangeGateway,
};
use crate::application::services::{
    InstrumentLocks, Lease, LockRunError, SettlementError, SettlementOutcome, TradeSettlement,
    record_settlement_outcome,
};
use crate::domain::position_ledger::PositionRepository;
use crate::domain::shared::{InstrumentRegistry, RepositoryError, TradeId};
use crate::domain::trade_execution::{FailureKind, TradeRepository};
use crate::observability;

/// What one reconciliation pass did to a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeReconciliation {
    /// The trade was already terminal (or no longer exists).
    Unchanged,
    /// Moved to `Completed`.
    Completed,
    /// Moved to `Failed`.
    Failed,
    /// Remote order not terminal, or its status could not be fetched.
    StillPending,
    /// An execution held the instrument lock; retried next cycle.
    Deferred,
}

/// Totals for one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Pending trades examined.
    pub checked: usize,
    /// Trades completed this cycle.
    pub completed: usize,
    /// Trades failed this cycle.
    pub failed: usize,
    /// Trades still pending.
    pub still_pending: usize,
    /// Trades skipped because their instrument was locked.
    pub deferred: usize,
    /// Trades that hit a repository or lock store error.
    pub errors: usize,
}

/// Reconciliation failure for a single trade.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReconcileError {
    /// Repository failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Settlement failure.
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    /// Lock failure.
    #[error(transparent)]
    Lock(#[from] LockRunError),
}

/// Background reconciler for pending trades.
pub struct OrderReconciler<G, L, T, P, E>
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
    settlement: TradeSettlement<T, P, E>,
    clock: Arc<dyn ClockPort>,
}

impl<G, L, T, P, E> OrderReconciler<G, L, T, P, E>
where
    G: ExchangeGateway,
    L: DistributedLockPort,
    T: TradeRepository,
    P: PositionRepository,
    E: EventPublisherPort,
{
    /// Create a reconciler sharing the coordinator's lock store.
    pub fn new(
        gateway: Arc<G>,
        lock_store: Arc<L>,
        trades: Arc<T>,
        positions: Arc<P>,
        events: Arc<E>,
        clock: Arc<dyn ClockPort>,
        registry: Arc<InstrumentRegistry>,
    ) -> Self {
        Self {
            gateway,
            locks: InstrumentLocks::new(lock_store, Duration::from_secs(30)),
            settlement: TradeSettlement::new(Arc::clone(&trades), positions, events, registry),
            trades,
            clock,
        }
    }

    /// Use `ttl` for the instrument lock.
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.locks = InstrumentLocks::new(self.locks.store(), ttl);
        self
    }

    /// Run one pass over every pending trade.
    ///
    /// Per-trade errors are logged and counted; they never abort the pass.
    ///
    /// # Errors
    ///
    /// Returns an error only if the pending trades cannot be listed.
    pub async fn reconcile_once(&self) -> Result<ReconciliationReport, RepositoryError> {
        let started = tokio::time::Instant::now();
        let pending = self.trades.find_pending().await?;
        let mut report = ReconciliationReport {
            checked: pending.len(),
            ..ReconciliationReport::default()
        };

        for trade in &pending {
            match self.reconcile_trade(trade.id()).await {
                Ok(TradeReconciliation::Completed) => report.completed += 1,
                Ok(TradeReconciliation::Failed) => report.failed += 1,
                Ok(TradeReconciliation::StillPending) => report.still_pending += 1,
                Ok(TradeReconciliation::Deferred) => report.deferred += 1,
                Ok(TradeReconciliation::Unchanged) => {}
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(trade_id = %trade.id(), error = %e, "Reconciliation failed");
                }
            }
        }

        observability::record_reconciliation_cycle(
            report.checked,
            report.still_pending + report.deferred,
            started.elapsed().as_secs_f64(),
        );
        if report.checked > 0 {
            tracing::info!(
                checked = report.checked,
                completed = report.completed,
                failed = report.failed,
                still_pending = report.still_pending,
                deferred = report.deferred,
                errors = report.errors,
                "Reconciliation cycle finished"
            );
        }
        Ok(report)
    }

    /// Reconcile one trade.
    ///
    /// # Errors
    ///
    /// Returns an error on repository, settlement or lock store failure.
    pub async fn reconcile_trade(
        &self,
        trade_id: &TradeId,
    ) -> Result<TradeReconciliation, ReconcileError> {
        let Some(trade) = self.trades.find_by_id(trade_id).await? else {
            return Ok(TradeReconciliation::Unchanged);
        };
        if trade.status().is_terminal() {
            return Ok(TradeReconciliation::Unchanged);
        }

        let instrument = trade.instrument().clone();
        match self
            .locks
            .run(&instrument, |lease| self.reconcile_locked(trade_id, lease))
            .await?
        {
            Some(result) => result,
            None => {
                tracing::debug!(%trade_id, %instrument, "Instrument busy, deferring trade");
                Ok(TradeReconciliation::Deferred)
            }
        }
    }

    async fn reconcile_locked(
        &self,
        trade_id: &TradeId,
        lease: Lease<L>,
    ) -> Result<TradeReconciliation, ReconcileError> {
        // Re-read: the trade may have settled before the lock was taken
        let Some(mut trade) = self.trades.find_by_id(trade_id).await? else {
            return Ok(TradeReconciliation::Unchanged);
        };
        if trade.status().is_terminal() {
            return Ok(TradeReconciliation::Unchanged);
        }

        let Some(order_id) = trade.external_order_id().cloned() else {
            let outcome = self
                .settlement
                .fail(
                    &mut trade,
                    FailureKind::DataIntegrity,
                    "no external order id: the order never reached the brokerage".to_string(),
                    self.clock.now(),
                )
                .await?;
            record_settlement_outcome("reconciler", &outcome);
            return Ok(Self::classify(&outcome));
        };

        let snapshot = match self.gateway.get_order(&order_id, CallPriority::Low).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    %trade_id,
                    external_order_id = %order_id,
                    error = %e,
                    "Order status unavailable, retrying next cycle"
                );
                return Ok(TradeReconciliation::StillPending);
            }
        };

        if !lease.still_held().await {
            tracing::warn!(
                %trade_id,
                key = lease.key(),
                "Instrument lock lapsed, deferring trade"
            );
            return Ok(TradeReconciliation::Deferred);
        }

        let outcome = self
            .settlement
            .apply(&mut trade, &snapshot, self.clock.now())
            .await?;
        record_settlement_outcome("reconciler", &outcome);
        if outcome == SettlementOutcome::StillPending {
            tracing::debug!(
                %trade_id,
                external_order_id = %order_id,
                remote_state = %snapshot.state,
                "Order not terminal yet"
            );
        }
        Ok(Self::classify(&outcome))
    }

    const fn classify(outcome: &SettlementOutcome) -> TradeReconciliation {
        match outcome {
            SettlementOutcome::Unchanged => TradeReconciliation::Unchanged,
            SettlementOutcome::StillPending => TradeReconciliation::StillPending,
            SettlementOutcome::Completed { .. } => TradeReconciliation::Completed,
            SettlementOutcome::Failed { .. } => TradeReconciliation::Failed,
        }
    }
}
