//! Position Ledger Bounded Context
//!
//! Tranche-based position accounting per instrument: weighted average
//! cost, DCA impact, FIFO partial exits, performance scoring and the
//! sizing rules that decide how large the next tranche should be.

pub mod errors;
pub mod performance;
pub mod position;
pub mod repository;
pub mod sizing;
pub mod tranche;

pub use errors::LedgerError;
pub use performance::{ExitCheck, ExitTrigger, PerformanceReport, TranchePerformance};
pub use position::{DcaImpact, ExitAllocation, ExitPlan, Position, PositionStatus, SettledFill};
pub use repository::PositionRepository;
pub use sizing::{SizingBreakdown, SizingInput, SizingParameters, TrancheSizer};
pub use tranche::Tranche;
