//! Trade lifecycle errors.

use std::fmt;

use super::value_objects::TradeStatus;

/// Errors raised by the Trade aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    /// Transition not allowed from the current status.
    InvalidStateTransition {
        /// Current status.
        from: TradeStatus,
        /// Attempted status.
        to: TradeStatus,
    },

    /// Fill data cannot be applied.
    InvalidFill {
        /// What is wrong with it.
        message: String,
    },

    /// External order id already attached and differs.
    ExternalIdMismatch {
        /// Id already on the trade.
        existing: String,
        /// Id offered.
        offered: String,
    },
}

impl fmt::Display for TradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStateTransition { from, to } => {
                write!(f, "Invalid trade state transition: {from} -> {to}")
            }
            Self::InvalidFill { message } => write!(f, "Invalid fill: {message}"),
            Self::ExternalIdMismatch { existing, offered } => write!(
                f,
                "Trade already linked to order {existing}, refusing {offered}"
            ),
        }
    }
}

impl std::error::Error for TradeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_error_display() {
        let err = TradeError::InvalidStateTransition {
            from: TradeStatus::Failed,
            to: TradeStatus::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Invalid trade state transition: FAILED -> COMPLETED"
        );
    }
}
