//! One entry lot inside a position.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{LotId, Money, Timestamp};

/// A discrete entry lot.
///
/// Immutable except for partial reduction during an exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tranche {
    lot_id: LotId,
    entry_price: Decimal,
    notional: Money,
    opened_at: Timestamp,
    sequence_number: u32,
}

impl Tranche {
    pub(super) fn new(
        entry_price: Decimal,
        notional: Money,
        opened_at: Timestamp,
        sequence_number: u32,
    ) -> Self {
        Self {
            lot_id: LotId::generate(),
            entry_price,
            notional,
            opened_at,
            sequence_number,
        }
    }

    /// Lot id.
    #[must_use]
    pub const fn lot_id(&self) -> &LotId {
        &self.lot_id
    }

    /// Entry price.
    #[must_use]
    pub const fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Remaining cost-basis notional.
    #[must_use]
    pub const fn notional(&self) -> Money {
        self.notional
    }

    /// When the lot was opened.
    #[must_use]
    pub const fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    /// Position-wide, monotonically increasing sequence number.
    #[must_use]
    pub const fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Base units held: `notional / entry_price`.
    #[must_use]
    pub fn units(&self) -> Decimal {
        self.notional
            .amount()
            .checked_div(self.entry_price)
            .unwrap_or(Decimal::ZERO)
    }

    /// Current value of the lot at `price`.
    #[must_use]
    pub fn market_value(&self, price: Decimal) -> Money {
        Money::new(self.units() * price)
    }

    /// Return since entry, in percent.
    #[must_use]
    pub fn return_pct(&self, price: Decimal) -> Decimal {
        (price - self.entry_price)
            .checked_div(self.entry_price)
            .map_or(Decimal::ZERO, |r| r * Decimal::ONE_HUNDRED)
    }

    /// Unrealized P&L at `price`.
    #[must_use]
    pub fn unrealized_pnl(&self, price: Decimal) -> Money {
        self.market_value(price) - self.notional
    }

    pub(super) fn reduce(&mut self, notional: Money) {
        self.notional -= notional;
    }
}
