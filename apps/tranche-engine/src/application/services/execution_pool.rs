//! Bounded pool of concurrent executions.

use std::sync::Arc;

use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinHandle;

use crate::application::ports::{DistributedLockPort, EventPublisherPort, ExchangeGateway};
use crate::application::use_cases::ExecutionCoordinator;
use crate::domain::position_ledger::PositionRepository;
use crate::domain::trade_execution::{ExecutionOutcome, TradeRepository, TradingDecision};

/// Services `execute()` calls on at most `size` tasks at once.
///
/// Same-instrument calls are still serialized by the instrument lock; the
/// pool only bounds total concurrency.
pub struct ExecutionPool<G, L, T, P, E>
where
    G: ExchangeGateway + 'static,
    L: DistributedLockPort + 'static,
    T: TradeRepository + 'static,
    P: PositionRepository + 'static,
    E: EventPublisherPort + 'static,
{
    coordinator: Arc<ExecutionCoordinator<G, L, T, P, E>>,
    permits: Arc<Semaphore>,
    size: u32,
}

impl<G, L, T, P, E> ExecutionPool<G, L, T, P, E>
where
    G: ExchangeGateway + 'static,
    L: DistributedLockPort + 'static,
    T: TradeRepository + 'static,
    P: PositionRepository + 'static,
    E: EventPublisherPort + 'static,
{
    /// Pool of `size` workers (at least one).
    pub fn new(coordinator: Arc<ExecutionCoordinator<G, L, T, P, E>>, size: u32) -> Self {
        let size = size.max(1);
        Self {
            coordinator,
            permits: Arc::new(Semaphore::new(size as usize)),
            size,
        }
    }

    /// Workers currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free worker, then run `decision` on it.
    ///
    /// # Errors
    ///
    /// Returns `AcquireError` once the pool has been closed.
    pub async fn submit(
        &self,
        decision: TradingDecision,
    ) -> Result<JoinHandle<ExecutionOutcome>, AcquireError> {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        let coordinator = Arc::clone(&self.coordinator);
        Ok(tokio::spawn(async move {
            let outcome = coordinator.execute(decision).await;
            drop(permit);
            outcome
        }))
    }

    /// Stop accepting work and wait for in-flight executions to finish.
    pub async fn shutdown(&self) {
        match self.permits.acquire_many(self.size).await {
            Ok(_all) => tracing::debug!("Execution pool drained"),
            Err(e) => tracing::debug!(error = %e, "Execution pool already closed"),
        }
        self.permits.close();
    }
}
