//! Per-instrument execution lock.
//!
//! Wraps a [`DistributedLockPort`] so the locked section is released on
//! every exit path, including a panic inside it. While the section runs the
//! lock is renewed every third of its TTL, so a slow brokerage call cannot
//! let the lock lapse under a live holder. A crashed process stops renewing
//! and the lock expires as usual.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, MissedTickBehavior};

use crate::application::ports::{DistributedLockPort, LockError, LockToken};
use crate::domain::shared::InstrumentId;

/// Failure of a locked run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockRunError {
    /// The lock store failed during acquire.
    #[error(transparent)]
    Store(#[from] LockError),
    /// The locked section panicked; the lock was released.
    #[error("locked section panicked: {0}")]
    Panicked(String),
}

/// One holder's claim on an instrument lock, handed to the locked section.
pub struct Lease<L>
where
    L: DistributedLockPort,
{
    store: Arc<L>,
    key: String,
    token: LockToken,
    ttl: Duration,
}

impl<L> Clone for Lease<L>
where
    L: DistributedLockPort,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            token: self.token.clone(),
            ttl: self.ttl,
        }
    }
}

impl<L> Lease<L>
where
    L: DistributedLockPort,
{
    /// Lock key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Renew the lease and report whether this holder still owns the lock.
    ///
    /// A store failure counts as lost.
    pub async fn still_held(&self) -> bool {
        match self.store.extend(&self.key, &self.token, self.ttl).await {
            Ok(held) => held,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Lock renewal failed");
                false
            }
        }
    }

    /// Renew until the lease is lost. Never returns while it is held.
    async fn keep_alive(&self, every: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !self.still_held().await {
                return;
            }
        }
    }
}

/// Runs futures under the `execution:{instrument}` lock.
pub struct InstrumentLocks<L>
where
    L: DistributedLockPort,
{
    store: Arc<L>,
    ttl: Duration,
}

impl<L> InstrumentLocks<L>
where
    L: DistributedLockPort,
{
    /// Locks expire `ttl` after their last renewal.
    pub const fn new(store: Arc<L>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Lock key for an instrument.
    #[must_use]
    pub fn key(instrument: &InstrumentId) -> String {
        format!("execution:{instrument}")
    }

    /// The backing lock store.
    #[must_use]
    pub fn store(&self) -> Arc<L> {
        Arc::clone(&self.store)
    }

    /// Configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn renew_every(&self) -> Duration {
        (self.ttl / 3).max(Duration::from_millis(1))
    }

    /// Run `section` while holding the instrument's lock.
    ///
    /// Returns `Ok(None)` without running `section` when the lock is held
    /// elsewhere. Never waits for the lock. The section receives its
    /// [`Lease`] so it can confirm ownership before an irreversible step.
    ///
    /// # Errors
    ///
    /// Returns `LockRunError::Store` if acquisition fails and
    /// `LockRunError::Panicked` if `section` panics.
    pub async fn run<F, Fut, T>(
        &self,
        instrument: &InstrumentId,
        section: F,
    ) -> Result<Option<T>, LockRunError>
    where
        F: FnOnce(Lease<L>) -> Fut,
        Fut: Future<Output = T> + Send,
    {
        let key = Self::key(instrument);
        let Some(token) = self.store.acquire(&key, self.ttl).await? else {
            tracing::debug!(%instrument, key = %key, "Instrument lock held elsewhere");
            return Ok(None);
        };
        let lease = Lease {
            store: self.store(),
            key,
            token,
            ttl: self.ttl,
        };

        let section = AssertUnwindSafe(section(lease.clone())).catch_unwind();
        let keep_alive = lease.keep_alive(self.renew_every());
        tokio::pin!(section);
        tokio::pin!(keep_alive);

        let mut renewing = true;
        let result = loop {
            tokio::select! {
                biased;
                result = &mut section => break result,
                () = &mut keep_alive, if renewing => {
                    renewing = false;
                    tracing::warn!(
                        %instrument,
                        key = %lease.key,
                        "Instrument lock lost while its section was running"
                    );
                }
            }
        };

        match self.store.release(&lease.key, &lease.token).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                %instrument,
                key = %lease.key,
                "Instrument lock had already lapsed, successor left untouched"
            ),
            Err(e) => tracing::warn!(
                %instrument,
                error = %e,
                ttl_secs = self.ttl.as_secs(),
                "Failed to release instrument lock, it will expire with its TTL"
            ),
        }

        result
            .map(Some)
            .map_err(|payload| LockRunError::Panicked(panic_message(payload.as_ref())))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::lock::InMemoryLockStore;

    fn locks() -> (Arc<InMemoryLockStore>, InstrumentLocks<InMemoryLockStore>) {
        let store = Arc::new(InMemoryLockStore::new());
        let locks = InstrumentLocks::new(Arc::clone(&store), Duration::from_secs(30));
        (store, locks)
    }

    #[tokio::test]
    async fn runs_and_releases() {
        let (store, locks) = locks();
        let instrument = InstrumentId::new("ETH-USD");

        let value = locks.run(&instrument, |_| async { 7 }).await.unwrap();
        assert_eq!(value, Some(7));
        assert!(!store.is_held("execution:ETH-USD"));
    }

    #[tokio::test]
    async fn busy_lock_skips_section() {
        let (store, locks) = locks();
        let instrument = InstrumentId::new("ETH-USD");
        let held = store
            .acquire("execution:ETH-USD", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(held.is_some());

        let ran = locks.run(&instrument, |_| async { true }).await.unwrap();
        assert_eq!(ran, None);
        assert!(store.is_held("execution:ETH-USD"));
    }

    #[tokio::test]
    async fn panic_releases_lock() {
        let (store, locks) = locks();
        let instrument = InstrumentId::new("BTC-USD");

        let result = locks
            .run(&instrument, |_| async {
                panic!("boom");
            })
            .await;
        assert_eq!(result, Err(LockRunError::Panicked("boom".to_string())));
        assert!(!store.is_held("execution:BTC-USD"));
    }

    #[tokio::test]
    async fn different_instruments_do_not_contend() {
        let (_store, locks) = locks();
        let eth = InstrumentId::new("ETH-USD");
        let btc = InstrumentId::new("BTC-USD");

        let nested = locks
            .run(&eth, |_| async { locks.run(&btc, |_| async { 1 }).await })
            .await
            .unwrap();
        assert_eq!(nested, Some(Ok(Some(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn section_outliving_ttl_keeps_the_lock() {
        let (store, locks) = locks();
        let instrument = InstrumentId::new("ETH-USD");
        let contender_store = Arc::clone(&store);

        let held_after = locks
            .run(&instrument, |lease| async move {
                tokio::time::sleep(Duration::from_secs(70)).await;
                let contender = contender_store
                    .acquire("execution:ETH-USD", Duration::from_secs(30))
                    .await
                    .unwrap();
                (contender.is_none(), lease.still_held().await)
            })
            .await
            .unwrap();
        assert_eq!(held_after, Some((true, true)));
        assert!(!store.is_held("execution:ETH-USD"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sections_never_overlap() {
        let (_store, locks) = locks();
        let locks = Arc::new(locks);
        let spans = Arc::new(parking_lot::Mutex::new(Vec::new()));

        // Sections last 45s against a 30s TTL; callers arrive every 20s.
        let handles: Vec<_> = (0..6u64)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let spans = Arc::clone(&spans);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(i * 20)).await;
                    locks
                        .run(&InstrumentId::new("ETH-USD"), |_| async {
                            let entered = Instant::now();
                            tokio::time::sleep(Duration::from_secs(45)).await;
                            spans.lock().push((entered, Instant::now()));
                        })
                        .await
                        .unwrap()
                        .is_some()
                })
            })
            .collect();

        let mut ran = 0;
        for handle in handles {
            if handle.await.unwrap() {
                ran += 1;
            }
        }

        let mut spans = spans.lock().clone();
        spans.sort();
        assert_eq!(ran, spans.len());
        assert_eq!(ran, 2);
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlapping sections: {pair:?}");
        }
    }
}
