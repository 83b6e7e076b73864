//! Event publisher adapters.

mod broadcast;
mod tracing_publisher;

pub use broadcast::BroadcastEventPublisher;
pub use tracing_publisher::TracingEventPublisher;
