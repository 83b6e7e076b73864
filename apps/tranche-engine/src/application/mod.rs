//! Application Layer
//!
//! The application layer orchestrates domain logic through use cases.
//! It defines:
//!
//! - **Ports**: Interfaces for the brokerage, the gateway, the lock store,
//!   the clock and event publication
//! - **Services**: Long-running or shared coordination (instrument locks,
//!   settlement, the reconciliation loop, the execution pool)
//! - **Use Cases**: Executing a decision and reconciling pending trades

pub mod ports;
pub mod services;
pub mod use_cases;

pub use ports::*;
pub use services::*;
pub use use_cases::*;
