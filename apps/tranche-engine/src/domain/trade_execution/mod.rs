//! Trade Execution Bounded Context
//!
//! The Trade aggregate, the upstream decision it is created from, the
//! remote order states it converges on, and the tagged outcome every
//! execution attempt produces.

pub mod aggregate;
pub mod errors;
pub mod events;
pub mod repository;
pub mod value_objects;

pub use aggregate::{Fill, NewTrade, Trade};
pub use errors::TradeError;
pub use events::TradeEvent;
pub use repository::TradeRepository;
pub use value_objects::{
    BlockKind, BlockReason, ExecutionOutcome, ExecutionReport, FailureKind, FailureReason,
    OrderSide, RemoteOrderState, Temperature, TradeStatus, TradingDecision,
};
