//! Terminal-status application shared by the coordinator's immediate poll
//! and the reconciler.
//!
//! Callers hold the instrument lock, so the trade and its position have a
//! single writer while this runs.
//!
//! A fill is booked on the position before the trade is saved `Completed`.
//! The position remembers which trades it has booked, so if the trade save
//! fails the next attempt finishes the trade without booking the fill again.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::application::ports::{EventPublisherPort, OrderSnapshot};
use crate::domain::position_ledger::{Position, PositionRepository, SettledFill};
use crate::domain::shared::{InstrumentRegistry, LotId, Money, RepositoryError, Timestamp};
use crate::domain::trade_execution::events::{TradeFailed, TradeFilled};
use crate::domain::trade_execution::{
    FailureKind, Fill, OrderSide, Trade, TradeError, TradeEvent, TradeRepository, TradeStatus,
};
use crate::observability;

/// What applying a brokerage snapshot did to a trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The trade was already terminal; nothing changed.
    Unchanged,
    /// The remote order is not terminal yet.
    StillPending,
    /// The trade completed and the ledger was updated.
    Completed {
        /// Average fill price.
        fill_price: Decimal,
        /// Tranche opened by a BUY.
        tranche_ref: Option<LotId>,
        /// P&L booked by a SELL.
        realized_pnl: Option<Money>,
    },
    /// The trade failed.
    Failed {
        /// Category.
        kind: FailureKind,
        /// Why.
        reason: String,
    },
}

/// Settlement failure. The trade stays as persisted before the call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettlementError {
    /// Repository failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Illegal trade transition.
    #[error(transparent)]
    Trade(#[from] TradeError),
}

/// Applies terminal order states to trades and positions.
pub struct TradeSettlement<T, P, E>
where
    T: TradeRepository,
    P: PositionRepository,
    E: EventPublisherPort,
{
    trades: Arc<T>,
    positions: Arc<P>,
    events: Arc<E>,
    registry: Arc<InstrumentRegistry>,
}

impl<T, P, E> TradeSettlement<T, P, E>
where
    T: TradeRepository,
    P: PositionRepository,
    E: EventPublisherPort,
{
    /// Create a settlement service.
    pub const fn new(
        trades: Arc<T>,
        positions: Arc<P>,
        events: Arc<E>,
        registry: Arc<InstrumentRegistry>,
    ) -> Self {
        Self {
            trades,
            positions,
            events,
            registry,
        }
    }

    /// Apply a brokerage snapshot to `trade`.
    ///
    /// Idempotent: a trade already `Completed` or `Failed` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a repository call fails or the trade rejects the
    /// transition.
    pub async fn apply(
        &self,
        trade: &mut Trade,
        snapshot: &OrderSnapshot,
        at: Timestamp,
    ) -> Result<SettlementOutcome, SettlementError> {
        if trade.status().is_terminal() {
            return Ok(SettlementOutcome::Unchanged);
        }

        let newly_linked = trade.external_order_id().is_none();
        if let Err(e) = trade.attach_external_order(snapshot.external_order_id.clone(), at) {
            return self.fail(trade, FailureKind::DataIntegrity, e.to_string(), at).await;
        }

        match snapshot.state.resolve() {
            None => {
                if newly_linked {
                    self.trades.save(trade).await?;
                }
                Ok(SettlementOutcome::StillPending)
            }
            Some(TradeStatus::Failed) => {
                let reason = format!("order {}", snapshot.state.to_string().to_lowercase());
                self.fail(trade, FailureKind::Rejected, reason, at).await
            }
            Some(_) => self.complete(trade, snapshot, at).await,
        }
    }

    /// Fail a pending trade, persist it and publish the event.
    ///
    /// # Errors
    ///
    /// Returns an error if the save fails or the trade is already completed.
    pub async fn fail(
        &self,
        trade: &mut Trade,
        kind: FailureKind,
        reason: String,
        at: Timestamp,
    ) -> Result<SettlementOutcome, SettlementError> {
        if !trade.fail(reason.clone(), at)? {
            return Ok(SettlementOutcome::Unchanged);
        }
        self.trades.save(trade).await?;

        if kind == FailureKind::DataIntegrity {
            tracing::error!(
                trade_id = %trade.id(),
                instrument = %trade.instrument(),
                reason = %reason,
                "Trade failed on data integrity"
            );
        } else {
            tracing::info!(
                trade_id = %trade.id(),
                instrument = %trade.instrument(),
                reason = %reason,
                "Trade failed"
            );
        }

        self.publish(TradeEvent::Failed(TradeFailed {
            trade_id: trade.id().clone(),
            instrument: trade.instrument().clone(),
            reason: reason.clone(),
            occurred_at: at,
        }))
        .await;

        Ok(SettlementOutcome::Failed { kind, reason })
    }

    async fn complete(
        &self,
        trade: &mut Trade,
        snapshot: &OrderSnapshot,
        at: Timestamp,
    ) -> Result<SettlementOutcome, SettlementError> {
        let Some(price) = snapshot
            .average_fill_price
            .filter(|p| *p > Decimal::ZERO)
        else {
            let reason = format!(
                "order {} reported filled without a fill price",
                snapshot.external_order_id
            );
            return self.fail(trade, FailureKind::DataIntegrity, reason, at).await;
        };

        let fill = Fill {
            price,
            units: snapshot.filled_units,
            fees: snapshot.fees,
        };
        match trade.complete(fill, at) {
            Ok(true) => {}
            Ok(false) => return Ok(SettlementOutcome::Unchanged),
            Err(TradeError::InvalidFill { message }) => {
                return self.fail(trade, FailureKind::DataIntegrity, message, at).await;
            }
            Err(e) => return Err(e.into()),
        }

        let mut position = self.load_position(trade).await?;
        let booked = if let Some(booked) = position.settled_fill(trade.id()) {
            tracing::info!(
                trade_id = %trade.id(),
                instrument = %trade.instrument(),
                "Fill already on the ledger, completing the trade record"
            );
            booked.clone()
        } else {
            let booked = match trade.side() {
                OrderSide::Buy => SettledFill {
                    tranche_ref: Self::open_tranche(&mut position, trade, &fill, at),
                    realized_pnl: None,
                },
                OrderSide::Sell => SettledFill {
                    tranche_ref: None,
                    realized_pnl: Self::close_units(&mut position, trade, &fill, at),
                },
            };
            position.mark_settled(trade.id().clone(), booked.clone());
            self.positions.save(&position).await?;
            booked
        };
        let SettledFill {
            tranche_ref,
            realized_pnl,
        } = booked;
        if let Some(lot_id) = &tranche_ref {
            trade.record_tranche(lot_id.clone());
        }
        if let Some(pnl) = realized_pnl {
            trade.record_realized_pnl(pnl);
        }

        self.trades.save(trade).await?;

        tracing::info!(
            trade_id = %trade.id(),
            instrument = %trade.instrument(),
            side = %trade.side(),
            price = %price,
            units = %fill.units,
            tranches = position.tranche_count(),
            status = ?position.status(),
            "Trade filled"
        );

        self.publish(TradeEvent::Filled(TradeFilled {
            trade_id: trade.id().clone(),
            instrument: trade.instrument().clone(),
            side: trade.side(),
            price,
            units: fill.units,
            tranche_ref: tranche_ref.clone(),
            realized_pnl,
            occurred_at: at,
        }))
        .await;

        Ok(SettlementOutcome::Completed {
            fill_price: price,
            tranche_ref,
            realized_pnl,
        })
    }

    async fn load_position(&self, trade: &Trade) -> Result<Position, RepositoryError> {
        let configured_max = self
            .registry
            .get(trade.instrument())
            .map(|config| config.max_tranches);
        let mut position = self
            .positions
            .find_by_instrument(trade.instrument())
            .await?
            .unwrap_or_else(|| {
                Position::new(trade.instrument().clone(), configured_max.unwrap_or(0))
            });
        if let Some(max) = configured_max {
            position.set_max_tranches(max);
        }
        Ok(position)
    }

    fn open_tranche(
        position: &mut Position,
        trade: &Trade,
        fill: &Fill,
        at: Timestamp,
    ) -> Option<LotId> {
        match position.add_tranche(fill.price, fill.notional(), at) {
            Ok(lot_id) => Some(lot_id),
            Err(e) => {
                tracing::error!(
                    trade_id = %trade.id(),
                    instrument = %trade.instrument(),
                    error = %e,
                    "BUY fill could not be added to the ledger, position unchanged"
                );
                None
            }
        }
    }

    fn close_units(
        position: &mut Position,
        trade: &Trade,
        fill: &Fill,
        at: Timestamp,
    ) -> Option<Money> {
        let held = position.total_units();
        if position.is_flat() || held <= Decimal::ZERO {
            tracing::warn!(
                trade_id = %trade.id(),
                instrument = %trade.instrument(),
                "SELL filled against a flat position, ledger unchanged"
            );
            return None;
        }

        let fraction = (fill.units / held).min(Decimal::ONE);
        match position.remove_partial(fraction, fill.price, at) {
            Ok(plan) => Some(plan.realized_pnl),
            Err(e) => {
                tracing::error!(
                    trade_id = %trade.id(),
                    instrument = %trade.instrument(),
                    error = %e,
                    "SELL fill could not be applied to the ledger, position unchanged"
                );
                None
            }
        }
    }

    async fn publish(&self, event: TradeEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.events.publish_trade_event(event).await {
            tracing::warn!(event_type, error = %e, "Failed to publish trade event");
        }
    }
}

/// Record a terminal outcome on the settlement counter.
pub(crate) fn record_outcome(path: &str, outcome: &SettlementOutcome) {
    match outcome {
        SettlementOutcome::Completed { .. } => observability::record_settlement(path, "completed"),
        SettlementOutcome::Failed { .. } => observability::record_settlement(path, "failed"),
        SettlementOutcome::Unchanged | SettlementOutcome::StillPending => {}
    }
}
