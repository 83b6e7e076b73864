//! Shared Value Objects
//!
//! Immutable domain types used across bounded contexts.
//! Value objects are compared by value, not identity.

mod identifiers;
mod instrument;
mod money;
mod timestamp;

pub use identifiers::{ExternalOrderId, InstrumentId, LotId, TradeId};
pub use instrument::{InstrumentConfig, InstrumentRegistry, SizingStrategy};
pub use money::Money;
pub use timestamp::Timestamp;
