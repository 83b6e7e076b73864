//! Publishes trade events as structured log lines.

use async_trait::async_trait;

use crate::application::ports::{EventPublishError, EventPublisherPort};
use crate::domain::trade_execution::TradeEvent;

/// Writes every event to the `trade_events` tracing target as JSON.
#[derive(Debug, Clone, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisherPort for TracingEventPublisher {
    async fn publish_trade_events(&self, events: Vec<TradeEvent>) -> Result<(), EventPublishError> {
        for event in events {
            let payload = serde_json::to_string(&event).map_err(|e| {
                EventPublishError::SerializationError {
                    message: e.to_string(),
                }
            })?;
            tracing::info!(
                target: "trade_events",
                event_type = event.event_type(),
                instrument = %event.instrument(),
                payload = %payload,
                "Trade event"
            );
        }
        Ok(())
    }
}
