//! Trade aggregate root.

mod trade;

pub use trade::{Fill, NewTrade, Trade};
