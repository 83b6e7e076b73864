//! Process-local TTL lock store.
//!
//! Expiry is measured on the tokio clock so paused-time tests can age locks.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::application::ports::{DistributedLockPort, LockError, LockToken};

#[derive(Debug)]
struct Entry {
    token: LockToken,
    expires: Instant,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires > now
    }
}

/// Compare-and-set lock map with expiring entries.
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryLockStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is held and unexpired.
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.entries
            .lock()
            .get(key)
            .is_some_and(|entry| entry.live(Instant::now()))
    }
}

#[async_trait]
impl DistributedLockPort for InMemoryLockStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, LockError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|entry| entry.live(now)) {
            return Ok(None);
        }
        let token = LockToken::generate();
        entries.insert(
            key.to_string(),
            Entry {
                token: token.clone(),
                expires: now + ttl,
            },
        );
        Ok(Some(token))
    }

    async fn extend(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.token == *token && entry.live(now) => {
                entry.expires = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError> {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|entry| entry.token == *token) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "execution:ETH-USD";

    #[tokio::test]
    async fn second_acquire_fails_until_release() {
        let store = InMemoryLockStore::new();
        let ttl = Duration::from_secs(30);
        let token = store.acquire(KEY, ttl).await.unwrap().unwrap();
        assert!(store.acquire(KEY, ttl).await.unwrap().is_none());
        assert!(store.acquire("execution:BTC-USD", ttl).await.unwrap().is_some());

        assert!(store.release(KEY, &token).await.unwrap());
        assert!(store.acquire(KEY, ttl).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_holder_expires() {
        let store = InMemoryLockStore::new();
        let ttl = Duration::from_secs(30);
        store.acquire(KEY, ttl).await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(store.acquire(KEY, ttl).await.unwrap().is_none());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.is_held(KEY));
        assert!(store.acquire(KEY, ttl).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_holder_cannot_release_successor() {
        let store = InMemoryLockStore::new();
        let ttl = Duration::from_secs(30);
        let stale = store.acquire(KEY, ttl).await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let current = store.acquire(KEY, ttl).await.unwrap().unwrap();
        assert_ne!(stale, current);

        assert!(!store.release(KEY, &stale).await.unwrap());
        assert!(store.is_held(KEY));
        assert!(store.acquire(KEY, ttl).await.unwrap().is_none());

        assert!(store.release(KEY, &current).await.unwrap());
        assert!(!store.is_held(KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn extend_keeps_owner_alive() {
        let store = InMemoryLockStore::new();
        let ttl = Duration::from_secs(30);
        let token = store.acquire(KEY, ttl).await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(store.extend(KEY, &token, ttl).await.unwrap());
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(store.is_held(KEY));
        assert!(store.acquire(KEY, ttl).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_owner_cannot_extend() {
        let store = InMemoryLockStore::new();
        let ttl = Duration::from_secs(30);
        let token = store.acquire(KEY, ttl).await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!store.extend(KEY, &token, ttl).await.unwrap());
        assert!(!store.is_held(KEY));
    }

    #[tokio::test]
    async fn releasing_unheld_key_is_noop() {
        let store = InMemoryLockStore::new();
        let token = LockToken::generate();
        assert!(!store.release("execution:NOPE", &token).await.unwrap());
    }
}
