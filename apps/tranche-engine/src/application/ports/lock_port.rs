//! Distributed Lock Port
//!
//! Named mutual exclusion with a time-to-live. A holder that crashes
//! without releasing loses the lock once the TTL expires. Every acquire
//! hands out a fresh [`LockToken`]; only that token renews or releases it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Lock store failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The lock store could not be reached.
    #[error("Lock store unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },
}

/// Ownership proof for one acquisition of a lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// A token no other acquisition shares.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Token as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Port for a TTL-bounded named lock.
#[async_trait]
pub trait DistributedLockPort: Send + Sync {
    /// Try to take `key` for `ttl`. Never waits.
    ///
    /// Returns `Ok(None)` if another holder has it and it has not expired.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, LockError>;

    /// Push the expiry of `key` to `ttl` from now.
    ///
    /// Returns `Ok(false)` when `token` no longer owns an unexpired `key`;
    /// the caller has lost the lock.
    async fn extend(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, LockError>;

    /// Release `key` if `token` still owns it (compare-and-delete).
    ///
    /// Returns `Ok(false)` without touching the key when someone else holds
    /// it or nobody does.
    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError>;
}
