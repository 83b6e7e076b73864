//! Clock Port

use crate::domain::shared::Timestamp;

/// Source of "now" for cooldowns, daily windows and trade timestamps.
pub trait ClockPort: Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;
}
