//! Application Ports (Driven)
//!
//! Ports define the interfaces the application uses to reach external systems.
//! Use cases depend only on these traits; adapters live in `infrastructure`.

mod broker_port;
mod clock_port;
mod event_publisher_port;
mod gateway_port;
mod lock_port;

pub use broker_port::{BrokerError, BrokerPort, OrderSnapshot, SubmitOrderRequest, Ticker};
pub use clock_port::ClockPort;
pub use event_publisher_port::{EventPublishError, EventPublisherPort, NoOpEventPublisher};
pub use gateway_port::{CallPriority, ExchangeGateway, GatewayError};
pub use lock_port::{DistributedLockPort, LockError, LockToken};
