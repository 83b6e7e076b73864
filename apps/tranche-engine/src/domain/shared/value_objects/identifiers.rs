//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up IDs from different contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a new unique identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    TradeId,
    "Internal trade identifier, also sent to the brokerage as the client order id."
);
define_id!(LotId, "Identifier of one tranche (entry lot) inside a position.");
define_id!(ExternalOrderId, "Brokerage-assigned order identifier.");
define_id!(
    InstrumentId,
    "Tradeable pair in `BASE-QUOTE` form, e.g. `BTC-USD`."
);

impl InstrumentId {
    /// Split into `(base, quote)` assets.
    ///
    /// Returns `None` unless the id is exactly two non-empty assets joined by `-`.
    #[must_use]
    pub fn assets(&self) -> Option<(&str, &str)> {
        let (base, quote) = self.0.split_once('-')?;
        if base.is_empty() || quote.is_empty() || quote.contains('-') {
            return None;
        }
        Some((base, quote))
    }

    /// Base asset (the thing being bought or sold).
    #[must_use]
    pub fn base_asset(&self) -> Option<&str> {
        self.assets().map(|(base, _)| base)
    }

    /// Quote asset (the currency notional is expressed in).
    #[must_use]
    pub fn quote_asset(&self) -> Option<&str> {
        self.assets().map(|(_, quote)| quote)
    }
}
