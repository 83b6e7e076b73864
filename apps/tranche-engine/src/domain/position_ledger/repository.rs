//! Position Repository Trait

use async_trait::async_trait;

use super::position::Position;
use crate::domain::shared::{InstrumentId, RepositoryError};

/// Repository trait for Position persistence.
///
/// One position row per instrument.
#[async_trait]
pub trait PositionRepository: Send + Sync {
    /// Save a position (insert or update).
    ///
    /// # Errors
    ///
    /// Returns error if persistence fails.
    async fn save(&self, position: &Position) -> Result<(), RepositoryError>;

    /// Position for an instrument, if one was ever saved.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_by_instrument(
        &self,
        instrument: &InstrumentId,
    ) -> Result<Option<Position>, RepositoryError>;

    /// All positions that are not `Closed`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn find_open(&self) -> Result<Vec<Position>, RepositoryError>;
}
