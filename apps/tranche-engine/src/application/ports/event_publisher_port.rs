//! Event Publisher Port (Driven Port)
//!
//! Interface for publishing trade lifecycle events to external observers.

use async_trait::async_trait;

use crate::domain::trade_execution::TradeEvent;

/// Event publishing error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventPublishError {
    /// No subscriber or sink is reachable.
    #[error("Event publish connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Serialization error.
    #[error("Event serialization error: {message}")]
    SerializationError {
        /// Error details.
        message: String,
    },
}

/// Port for publishing trade events.
///
/// Publication is best-effort: callers log failures and carry on.
#[async_trait]
pub trait EventPublisherPort: Send + Sync {
    /// Publish trade events.
    async fn publish_trade_events(&self, events: Vec<TradeEvent>) -> Result<(), EventPublishError>;

    /// Publish a single trade event.
    async fn publish_trade_event(&self, event: TradeEvent) -> Result<(), EventPublishError> {
        self.publish_trade_events(vec![event]).await
    }
}

/// No-op event publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisherPort for NoOpEventPublisher {
    async fn publish_trade_events(
        &self,
        _events: Vec<TradeEvent>,
    ) -> Result<(), EventPublishError> {
        Ok(())
    }
}
