//! Trade execution value objects.

mod decision;
mod order_side;
mod outcome;
mod remote_order_state;
mod temperature;
mod trade_status;

pub use decision::TradingDecision;
pub use order_side::OrderSide;
pub use outcome::{
    BlockKind, BlockReason, ExecutionOutcome, ExecutionReport, FailureKind, FailureReason,
};
pub use remote_order_state::RemoteOrderState;
pub use temperature::Temperature;
pub use trade_status::TradeStatus;
