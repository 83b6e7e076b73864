//! REST brokerage adapter (Alpaca-compatible crypto endpoints).
//!
//! Each method makes exactly one HTTP request. Retries, budgeting and
//! caching belong to the gateway in front of it.

mod adapter;
mod api_types;
mod config;

pub use adapter::RestBrokerAdapter;
pub use config::RestBrokerConfig;
