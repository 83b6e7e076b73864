//! Safety Bounded Context
//!
//! A pure multi-check validation pipeline. The application layer builds a
//! [`SafetySnapshot`] from the repositories, the clock and the current
//! price; [`SafetyGate::validate`] evaluates every check against it and
//! reports all failures, not just the first.

mod gate;
mod limits;
mod snapshot;
mod violation;

pub use gate::SafetyGate;
pub use limits::SafetyLimits;
pub use snapshot::{LastTrade, SafetyRequest, SafetySnapshot};
pub use violation::{GateDecision, SafetyCheck, SafetyViolation};
