//! Use Cases

mod execute_decision;
mod reconcile_trades;

pub use execute_decision::{ExecutionCoordinator, ExecutionSettings};
pub use reconcile_trades::{
    OrderReconciler, ReconcileError, ReconciliationReport, TradeReconciliation,
};
