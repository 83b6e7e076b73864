//! In-memory trade and position repositories.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::position_ledger::{Position, PositionRepository};
use crate::domain::shared::{InstrumentId, RepositoryError, Timestamp, TradeId};
use crate::domain::trade_execution::{Trade, TradeRepository, TradeStatus};

/// In-memory implementation of `TradeRepository`.
///
/// Suitable for testing, simulation and paper trading. State is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryTradeRepository {
    trades: RwLock<HashMap<TradeId, Trade>>,
}

impl InMemoryTradeRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored trades.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.read().len()
    }

    /// Check if the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.read().is_empty()
    }

    /// All trades, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<Trade> {
        self.collect(|_| true)
    }

    fn collect(&self, keep: impl Fn(&Trade) -> bool) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .trades
            .read()
            .values()
            .filter(|t| keep(t))
            .cloned()
            .collect();
        trades.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        trades
    }
}

#[async_trait]
impl TradeRepository for InMemoryTradeRepository {
    async fn save(&self, trade: &Trade) -> Result<(), RepositoryError> {
        self.trades.write().insert(trade.id().clone(), trade.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &TradeId) -> Result<Option<Trade>, RepositoryError> {
        Ok(self.trades.read().get(id).cloned())
    }

    async fn find_by_instrument(
        &self,
        instrument: &InstrumentId,
    ) -> Result<Vec<Trade>, RepositoryError> {
        Ok(self.collect(|t| t.instrument() == instrument))
    }

    async fn find_pending(&self) -> Result<Vec<Trade>, RepositoryError> {
        Ok(self.collect(|t| t.status() == TradeStatus::Pending))
    }

    async fn find_since(&self, since: Timestamp) -> Result<Vec<Trade>, RepositoryError> {
        Ok(self.collect(|t| t.created_at() >= since))
    }
}

/// In-memory implementation of `PositionRepository`, one row per instrument.
#[derive(Debug, Default)]
pub struct InMemoryPositionRepository {
    positions: RwLock<HashMap<InstrumentId, Position>>,
}

impl InMemoryPositionRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionRepository for InMemoryPositionRepository {
    async fn save(&self, position: &Position) -> Result<(), RepositoryError> {
        self.positions
            .write()
            .insert(position.instrument().clone(), position.clone());
        Ok(())
    }

    async fn find_by_instrument(
        &self,
        instrument: &InstrumentId,
    ) -> Result<Option<Position>, RepositoryError> {
        Ok(self.positions.read().get(instrument).cloned())
    }

    async fn find_open(&self) -> Result<Vec<Position>, RepositoryError> {
        let mut open: Vec<Position> = self
            .positions
            .read()
            .values()
            .filter(|p| p.status().is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.instrument().cmp(b.instrument()));
        Ok(open)
    }
}
