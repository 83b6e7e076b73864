//! Infrastructure Layer
//!
//! Adapters implementing the application ports:
//!
//! - `broker`: REST brokerage adapter and the in-process paper broker
//! - `gateway`: the rate-limited gateway every brokerage call goes through
//! - `lock`, `persistence`, `events`, `clock`: in-process port implementations
//! - `config`: dependency injection container

pub mod broker;
pub mod clock;
pub mod config;
pub mod events;
pub mod gateway;
pub mod lock;
pub mod persistence;
