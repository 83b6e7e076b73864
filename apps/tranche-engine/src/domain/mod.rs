//! Domain Layer
//!
//! Pure business logic with no I/O: tranche positions, trades and the
//! safety gate that decides whether a trade may proceed.
//!
//! - `shared`: identifiers, money, timestamps and instrument configuration
//! - `position_ledger`: tranche-based position accounting and sizing
//! - `trade_execution`: the Trade aggregate, decisions and execution outcomes
//! - `safety`: the multi-check validation pipeline

pub mod position_ledger;
pub mod safety;
pub mod shared;
pub mod trade_execution;
