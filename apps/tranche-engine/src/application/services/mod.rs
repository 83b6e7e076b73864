//! Application Services
//!
//! Coordination shared by the use cases and long-running tasks.

mod execution_pool;
mod instrument_lock;
mod reconciliation_loop;
mod safety_context;
mod trade_settlement;

pub use execution_pool::ExecutionPool;
pub use instrument_lock::{InstrumentLocks, Lease, LockRunError};
pub use reconciliation_loop::{ReconciliationLoop, ReconciliationPass};
pub use safety_context::SafetyContext;
pub use trade_settlement::{SettlementError, SettlementOutcome, TradeSettlement};
pub(crate) use trade_settlement::record_outcome as record_settlement_outcome;
