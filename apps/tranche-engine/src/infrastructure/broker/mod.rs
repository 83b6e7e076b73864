//! Brokerage adapters implementing `BrokerPort`.

pub mod paper;
pub mod rest;

pub use paper::{FillMode, PaperBroker};
pub use rest::{RestBrokerAdapter, RestBrokerConfig};
