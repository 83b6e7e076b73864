//! Fan-out of trade events over a `tokio::sync::broadcast` channel.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::application::ports::{EventPublishError, EventPublisherPort};
use crate::domain::trade_execution::TradeEvent;

/// Broadcasts events to every live subscriber.
///
/// Slow subscribers observe `RecvError::Lagged` rather than blocking publishers.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<TradeEvent>,
}

impl BroadcastEventPublisher {
    /// Channel buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New subscription receiving events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisherPort for BroadcastEventPublisher {
    async fn publish_trade_events(&self, events: Vec<TradeEvent>) -> Result<(), EventPublishError> {
        for event in events {
            // No subscribers is not an error; events are advisory
            if self.sender.send(event).is_err() {
                tracing::debug!("No trade event subscribers");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::{InstrumentId, Timestamp, TradeId};
    use crate::domain::trade_execution::events::TradeFailed;

    fn failed(id: &str) -> TradeEvent {
        TradeEvent::Failed(TradeFailed {
            trade_id: TradeId::new(id),
            instrument: InstrumentId::new("ETH-USD"),
            reason: "order rejected".to_string(),
            occurred_at: Timestamp::now(),
        })
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let publisher = BroadcastEventPublisher::new(16);
        let mut rx = publisher.subscribe();

        publisher
            .publish_trade_events(vec![failed("t-1"), failed("t-2")])
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, TradeEvent::Failed(ref e) if e.trade_id.as_str() == "t-1"));
        assert!(matches!(second, TradeEvent::Failed(ref e) if e.trade_id.as_str() == "t-2"));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_succeeds() {
        let publisher = BroadcastEventPublisher::new(4);
        assert!(publisher.publish_trade_event(failed("t-1")).await.is_ok());
    }
}
