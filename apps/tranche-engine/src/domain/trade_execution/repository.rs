//! Trade Repository Trait
//!
//! Persistence abstraction for trades. Implemented by adapters in the
//! infrastructure layer.

use async_trait::async_trait;

use super::aggregate::Trade;
use crate::domain::shared::{InstrumentId, RepositoryError, Timestamp, TradeId};

/// Repository trait for Trade persistence.
#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// Save a trade (insert or update).
    ///
    /// # Errors
    ///
    /// Returns error if persistence fails.
    async fn save(&self, trade: &Trade) -> Result<(), RepositoryError>;

    /// Find a trade by id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_by_id(&self, id: &TradeId) -> Result<Option<Trade>, RepositoryError>;

    /// All trades for an instrument, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_by_instrument(
        &self,
        instrument: &InstrumentId,
    ) -> Result<Vec<Trade>, RepositoryError>;

    /// All `Pending` trades, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_pending(&self) -> Result<Vec<Trade>, RepositoryError>;

    /// All trades created at or after `since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_since(&self, since: Timestamp) -> Result<Vec<Trade>, RepositoryError>;
}
