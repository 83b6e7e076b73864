//! Periodic reconciliation task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{DistributedLockPort, EventPublisherPort, ExchangeGateway};
use crate::application::use_cases::{OrderReconciler, ReconciliationReport};
use crate::domain::position_ledger::PositionRepository;
use crate::domain::shared::RepositoryError;
use crate::domain::trade_execution::TradeRepository;

/// One reconciliation pass over pending trades.
#[async_trait]
pub trait ReconciliationPass: Send + Sync {
    /// Run the pass.
    async fn run_pass(&self) -> Result<ReconciliationReport, RepositoryError>;
}

#[async_trait]
impl<G, L, T, P, E> ReconciliationPass for OrderReconciler<G, L, T, P, E>
where
    G: ExchangeGateway,
    L: DistributedLockPort,
    T: TradeRepository,
    P: PositionRepository,
    E: EventPublisherPort,
{
    async fn run_pass(&self) -> Result<ReconciliationReport, RepositoryError> {
        self.reconcile_once().await
    }
}

/// Runs a [`ReconciliationPass`] on a fixed interval until cancelled.
///
/// Passes run inline on the loop task, so a slow pass delays the next tick
/// instead of overlapping it; missed ticks are skipped.
pub struct ReconciliationLoop<R>
where
    R: ReconciliationPass,
{
    pass: Arc<R>,
    interval: Duration,
    cancel: CancellationToken,
}

impl<R> ReconciliationLoop<R>
where
    R: ReconciliationPass,
{
    /// Create the loop.
    pub const fn new(pass: Arc<R>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            pass,
            interval,
            cancel,
        }
    }

    /// Run until the token is cancelled. Returns the number of passes run.
    pub async fn run(self) -> u64 {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut passes = 0;

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Reconciliation loop started"
        );
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!(passes, "Reconciliation loop stopped");
                    break;
                }
                _ = interval.tick() => {
                    passes += 1;
                    if let Err(e) = self.pass.run_pass().await {
                        tracing::error!(error = %e, "Could not list pending trades, retrying next cycle");
                    }
                }
            }
        }
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingPass {
        runs: AtomicU32,
        running: AtomicU32,
        overlapped: AtomicU32,
    }

    #[async_trait]
    impl ReconciliationPass for CountingPass {
        async fn run_pass(&self) -> Result<ReconciliationReport, RepositoryError> {
            if self.running.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.fetch_add(1, Ordering::SeqCst);
            }
            // Slower than the interval
            tokio::time::sleep(Duration::from_secs(25)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run == 1 {
                return Err(RepositoryError::Unavailable("down".to_string()));
            }
            Ok(ReconciliationReport::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_until_cancelled_without_overlap() {
        let pass = Arc::new(CountingPass::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            ReconciliationLoop::new(Arc::clone(&pass), Duration::from_secs(10), cancel.clone())
                .run(),
        );

        tokio::time::sleep(Duration::from_secs(80)).await;
        cancel.cancel();
        let passes = handle.await.unwrap();

        assert!(passes >= 3, "ran {passes} passes");
        assert!(pass.runs.load(Ordering::SeqCst) >= 3);
        assert_eq!(pass.overlapped.load(Ordering::SeqCst), 0);
    }
}
