//! In-process simulated venue.
//!
//! Fills notional market orders against a settable price table and debits or
//! credits per-asset balances. Used by the SIMULATED environment and by tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::application::ports::{
    BrokerError, BrokerPort, OrderSnapshot, SubmitOrderRequest, Ticker,
};
use crate::domain::shared::{ExternalOrderId, InstrumentId, Money, Timestamp, TradeId};
use crate::domain::trade_execution::{OrderSide, RemoteOrderState};

/// Base-unit precision for simulated fills.
const UNIT_SCALE: u32 = 8;

/// How submitted orders resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Filled in the submission response.
    #[default]
    Instant,
    /// Open until the order has been polled `polls` times.
    Delayed {
        /// Status lookups before the fill.
        polls: u32,
    },
    /// Every order is rejected by the venue.
    Reject,
}

/// One recorded call against the venue.
#[derive(Debug, Clone)]
pub struct BrokerCall {
    /// `submit_order`, `get_order`, `get_balance` or `get_ticker`.
    pub method: &'static str,
    /// When the call arrived (tokio clock).
    pub at: Instant,
}

#[derive(Debug)]
struct PaperOrder {
    request: SubmitOrderRequest,
    snapshot: OrderSnapshot,
    polls_remaining: u32,
}

#[derive(Debug, Default)]
struct PaperState {
    prices: HashMap<InstrumentId, Decimal>,
    balances: HashMap<String, Decimal>,
    orders: HashMap<ExternalOrderId, PaperOrder>,
    by_client_id: HashMap<TradeId, ExternalOrderId>,
    fill_mode: FillMode,
    failures: VecDeque<BrokerError>,
    method_failures: HashMap<&'static str, VecDeque<BrokerError>>,
    calls: Vec<BrokerCall>,
    next_order: u64,
}

impl PaperState {
    /// Settle an order at the current price, or reject it for lack of funds.
    fn fill(&mut self, order_id: &ExternalOrderId, fee_rate: Decimal) {
        let Some(order) = self.orders.get(order_id) else {
            return;
        };
        let request = order.request.clone();
        let price = self.prices.get(&request.instrument).copied();
        let assets = request
            .instrument
            .assets()
            .map(|(base, quote)| (base.to_uppercase(), quote.to_uppercase()));

        let outcome = match (price, assets) {
            (Some(price), Some((base, quote))) if price > Decimal::ZERO => {
                let notional = request.notional.amount();
                let units = (notional / price).round_dp(UNIT_SCALE);
                let fees = (notional * fee_rate).round_dp(2);
                let settled = match request.side {
                    OrderSide::Buy => {
                        self.debit(&quote, notional + fees) && {
                            self.credit(&base, units);
                            true
                        }
                    }
                    OrderSide::Sell => {
                        self.debit(&base, units) && {
                            self.credit(&quote, notional - fees);
                            true
                        }
                    }
                };
                settled.then_some((price, units, fees))
            }
            _ => None,
        };

        if let Some(order) = self.orders.get_mut(order_id) {
            match outcome {
                Some((price, units, fees)) => {
                    order.snapshot.state = RemoteOrderState::Filled;
                    order.snapshot.filled_units = units;
                    order.snapshot.average_fill_price = Some(price);
                    order.snapshot.fees = Money::new(fees);
                }
                None => order.snapshot.state = RemoteOrderState::Rejected,
            }
        }
    }

    fn debit(&mut self, asset: &str, amount: Decimal) -> bool {
        let balance = self.balances.entry(asset.to_string()).or_default();
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        true
    }

    fn credit(&mut self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_default() += amount;
    }
}

/// Simulated brokerage.
#[derive(Debug, Default)]
pub struct PaperBroker {
    state: Mutex<PaperState>,
    latency: Option<Duration>,
    fee_rate: Decimal,
}

impl PaperBroker {
    /// Venue with no prices, no balances, instant fills and no fees.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` (tokio clock).
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Charge `rate × notional` per fill.
    #[must_use]
    pub fn with_fee_rate(mut self, rate: Decimal) -> Self {
        self.fee_rate = rate;
        self
    }

    /// Set the last price of an instrument.
    pub fn set_price(&self, instrument: &InstrumentId, price: Decimal) {
        self.state.lock().prices.insert(instrument.clone(), price);
    }

    /// Set an asset balance.
    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        self.state
            .lock()
            .balances
            .insert(asset.to_uppercase(), amount);
    }

    /// Current asset balance.
    #[must_use]
    pub fn balance(&self, asset: &str) -> Decimal {
        self.state
            .lock()
            .balances
            .get(&asset.to_uppercase())
            .copied()
            .unwrap_or_default()
    }

    /// Change how subsequent orders resolve.
    pub fn set_fill_mode(&self, mode: FillMode) {
        self.state.lock().fill_mode = mode;
    }

    /// Fail the next call with `error`. Queued failures are consumed in order.
    pub fn inject_failure(&self, error: BrokerError) {
        self.state.lock().failures.push_back(error);
    }

    /// Fail the next call of `method` with `error`, leaving other methods alone.
    pub fn inject_failure_for(&self, method: &'static str, error: BrokerError) {
        self.state
            .lock()
            .method_failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls of one method.
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Distinct orders accepted (resubmissions of a client id are not counted).
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.state.lock().orders.len()
    }

    async fn enter(&self, method: &'static str) -> Result<(), BrokerError> {
        self.state.lock().calls.push(BrokerCall {
            method,
            at: Instant::now(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock();
        let targeted = state
            .method_failures
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        match targeted.or_else(|| state.failures.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BrokerPort for PaperBroker {
    async fn submit_order(
        &self,
        request: SubmitOrderRequest,
    ) -> Result<OrderSnapshot, BrokerError> {
        self.enter("submit_order").await?;
        let mut state = self.state.lock();

        if let Some(existing) = state.by_client_id.get(&request.client_order_id)
            && let Some(order) = state.orders.get(existing)
        {
            tracing::debug!(client_order_id = %request.client_order_id, "Duplicate submission");
            return Ok(order.snapshot.clone());
        }

        state.next_order += 1;
        let order_id = ExternalOrderId::new(format!("paper-{}", state.next_order));
        let mode = state.fill_mode;
        let snapshot = OrderSnapshot {
            external_order_id: order_id.clone(),
            client_order_id: request.client_order_id.clone(),
            state: if mode == FillMode::Reject {
                RemoteOrderState::Rejected
            } else {
                RemoteOrderState::Open
            },
            filled_units: Decimal::ZERO,
            average_fill_price: None,
            fees: Money::ZERO,
        };
        state
            .by_client_id
            .insert(request.client_order_id.clone(), order_id.clone());
        state.orders.insert(
            order_id.clone(),
            PaperOrder {
                request,
                snapshot,
                polls_remaining: match mode {
                    FillMode::Delayed { polls } => polls,
                    _ => 0,
                },
            },
        );

        if mode == FillMode::Instant {
            state.fill(&order_id, self.fee_rate);
        }

        state
            .orders
            .get(&order_id)
            .map(|o| o.snapshot.clone())
            .ok_or_else(|| BrokerError::Unknown {
                message: format!("order {order_id} vanished"),
            })
    }

    async fn get_order(&self, order_id: &ExternalOrderId) -> Result<OrderSnapshot, BrokerError> {
        self.enter("get_order").await?;
        let mut state = self.state.lock();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.snapshot.state == RemoteOrderState::Open {
            order.polls_remaining = order.polls_remaining.saturating_sub(1);
            if order.polls_remaining == 0 {
                state.fill(order_id, self.fee_rate);
            }
        }

        state
            .orders
            .get(order_id)
            .map(|o| o.snapshot.clone())
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: order_id.to_string(),
            })
    }

    async fn get_balance(&self, asset: &str) -> Result<Decimal, BrokerError> {
        self.enter("get_balance").await?;
        Ok(self.balance(asset))
    }

    async fn get_ticker(&self, instrument: &InstrumentId) -> Result<Ticker, BrokerError> {
        self.enter("get_ticker").await?;
        let price = self
            .state
            .lock()
            .prices
            .get(instrument)
            .copied()
            .ok_or_else(|| BrokerError::InvalidResponse {
                message: format!("no price for {instrument}"),
            })?;
        Ok(Ticker {
            instrument: instrument.clone(),
            price,
            at: Timestamp::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eth() -> InstrumentId {
        InstrumentId::new("ETH-USD")
    }

    fn order(id: &str, side: OrderSide, notional: Decimal) -> SubmitOrderRequest {
        SubmitOrderRequest {
            client_order_id: TradeId::new(id),
            instrument: eth(),
            side,
            notional: Money::new(notional),
        }
    }

    fn venue() -> PaperBroker {
        let broker = PaperBroker::new().with_fee_rate(dec!(0.001));
        broker.set_price(&eth(), dec!(2000));
        broker.set_balance("USD", dec!(1000));
        broker
    }

    #[tokio::test]
    async fn instant_buy_moves_balances() {
        let broker = venue();
        let snapshot = broker
            .submit_order(order("t-1", OrderSide::Buy, dec!(100)))
            .await
            .unwrap();

        assert_eq!(snapshot.state, RemoteOrderState::Filled);
        assert_eq!(snapshot.filled_units, dec!(0.05));
        assert_eq!(snapshot.average_fill_price, Some(dec!(2000)));
        assert_eq!(snapshot.fees, Money::new(dec!(0.1)));
        assert_eq!(broker.balance("USD"), dec!(899.9));
        assert_eq!(broker.balance("ETH"), dec!(0.05));
    }

    #[tokio::test]
    async fn resubmission_is_deduplicated() {
        let broker = venue();
        let first = broker
            .submit_order(order("t-1", OrderSide::Buy, dec!(100)))
            .await
            .unwrap();
        let second = broker
            .submit_order(order("t-1", OrderSide::Buy, dec!(100)))
            .await
            .unwrap();

        assert_eq!(first.external_order_id, second.external_order_id);
        assert_eq!(broker.order_count(), 1);
        assert_eq!(broker.balance("ETH"), dec!(0.05));
    }

    #[tokio::test]
    async fn delayed_fill_resolves_after_polls() {
        let broker = venue();
        broker.set_fill_mode(FillMode::Delayed { polls: 2 });
        let submitted = broker
            .submit_order(order("t-1", OrderSide::Buy, dec!(100)))
            .await
            .unwrap();
        assert_eq!(submitted.state, RemoteOrderState::Open);

        let id = submitted.external_order_id;
        assert_eq!(
            broker.get_order(&id).await.unwrap().state,
            RemoteOrderState::Open
        );
        assert_eq!(
            broker.get_order(&id).await.unwrap().state,
            RemoteOrderState::Filled
        );
        assert_eq!(broker.call_count("get_order"), 2);
    }

    #[tokio::test]
    async fn sell_without_holdings_is_rejected() {
        let broker = venue();
        let snapshot = broker
            .submit_order(order("t-1", OrderSide::Sell, dec!(100)))
            .await
            .unwrap();
        assert_eq!(snapshot.state, RemoteOrderState::Rejected);
        assert_eq!(broker.balance("USD"), dec!(1000));
    }

    #[tokio::test]
    async fn reject_mode() {
        let broker = venue();
        broker.set_fill_mode(FillMode::Reject);
        let snapshot = broker
            .submit_order(order("t-1", OrderSide::Buy, dec!(100)))
            .await
            .unwrap();
        assert_eq!(snapshot.state, RemoteOrderState::Rejected);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let broker = venue();
        broker.inject_failure(BrokerError::Timeout);
        broker.inject_failure(BrokerError::RateLimited { retry_after: None });

        assert_eq!(
            broker.get_ticker(&eth()).await.unwrap_err(),
            BrokerError::Timeout
        );
        assert!(matches!(
            broker.get_balance("USD").await,
            Err(BrokerError::RateLimited { .. })
        ));
        assert_eq!(broker.get_ticker(&eth()).await.unwrap().price, dec!(2000));
        assert_eq!(broker.calls().len(), 3);
    }

    #[tokio::test]
    async fn targeted_failure_skips_other_methods() {
        let broker = venue();
        broker.inject_failure_for("submit_order", BrokerError::Timeout);

        assert!(broker.get_ticker(&eth()).await.is_ok());
        assert_eq!(
            broker
                .submit_order(order("t-1", OrderSide::Buy, dec!(100)))
                .await
                .unwrap_err(),
            BrokerError::Timeout
        );
        assert_eq!(broker.order_count(), 0);
    }

    #[tokio::test]
    async fn unknown_order() {
        let broker = venue();
        assert!(matches!(
            broker.get_order(&ExternalOrderId::new("nope")).await,
            Err(BrokerError::OrderNotFound { .. })
        ));
    }
}
