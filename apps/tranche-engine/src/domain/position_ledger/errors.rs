//! Position ledger errors.

use std::fmt;

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// An argument is out of range.
    InvalidInput {
        /// Argument name.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Adding a tranche would exceed the configured capacity.
    CapacityExceeded {
        /// Instrument.
        instrument: String,
        /// Configured maximum.
        max_tranches: u32,
    },

    /// The operation needs at least one open tranche.
    EmptyPosition {
        /// Instrument.
        instrument: String,
    },
}

impl LedgerError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { field, message } => {
                write!(f, "Invalid ledger input '{field}': {message}")
            }
            Self::CapacityExceeded {
                instrument,
                max_tranches,
            } => write!(
                f,
                "Position {instrument} already holds the maximum of {max_tranches} tranches"
            ),
            Self::EmptyPosition { instrument } => {
                write!(f, "Position {instrument} has no open tranches")
            }
        }
    }
}

impl std::error::Error for LedgerError {}
