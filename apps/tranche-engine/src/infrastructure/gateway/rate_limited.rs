//! The gateway implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::GatewaySettings;
use super::budget::RateBudget;
use super::cache::ResponseCache;
use super::call::{GatewayCall, GatewayResponse};
use super::queue::CallQueue;
use super::retry::ExponentialBackoffCalculator;
use crate::application::ports::{
    BrokerError, BrokerPort, CallPriority, ExchangeGateway, GatewayError, OrderSnapshot,
    SubmitOrderRequest, Ticker,
};
use crate::domain::shared::{ExternalOrderId, InstrumentId};
use crate::observability;

#[derive(Debug)]
struct GatewayState {
    budget: RateBudget,
    cache: ResponseCache,
    queue: CallQueue,
}

/// Operator view of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayStats {
    /// Calls dispatched in the trailing window.
    pub calls_in_window: usize,
    /// Budget per window.
    pub budget: u32,
    /// Calls waiting for budget.
    pub queue_depth: usize,
    /// Time left in the post-429 cooldown.
    pub cooldown_remaining: Duration,
    /// Live cache entries.
    pub cache_entries: usize,
}

/// Removes a waiting ticket if the waiting future is dropped.
struct QueueTicket<'a> {
    state: &'a Mutex<GatewayState>,
    notify: &'a Notify,
    sequence: u64,
    armed: bool,
}

impl Drop for QueueTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            let depth = {
                let mut state = self.state.lock();
                state.queue.remove(self.sequence);
                state.queue.len()
            };
            observability::update_queue_depth(depth);
            self.notify.notify_waiters();
        }
    }
}

/// Rate-limited, caching, retrying gateway over a [`BrokerPort`].
pub struct RateLimitedGateway<B>
where
    B: BrokerPort,
{
    broker: Arc<B>,
    settings: GatewaySettings,
    state: Mutex<GatewayState>,
    notify: Notify,
}

impl<B> RateLimitedGateway<B>
where
    B: BrokerPort,
{
    /// Create a gateway in front of `broker`.
    pub fn new(broker: Arc<B>, settings: GatewaySettings) -> Self {
        let state = GatewayState {
            budget: RateBudget::new(settings.calls_per_window, settings.window),
            cache: ResponseCache::new(settings.cache_ttl),
            queue: CallQueue::default(),
        };
        Self {
            broker,
            settings,
            state: Mutex::new(state),
            notify: Notify::new(),
        }
    }

    /// Current budget, queue and cache state.
    pub fn stats(&self) -> GatewayStats {
        let now = Instant::now();
        let mut state = self.state.lock();
        GatewayStats {
            calls_in_window: state.budget.used(now),
            budget: self.settings.calls_per_window,
            queue_depth: state.queue.len(),
            cooldown_remaining: state.budget.cooldown_remaining(now),
            cache_entries: state.cache.len(now),
        }
    }

    /// Execute `call` at `priority`.
    ///
    /// Reads are served from cache when fresh. Otherwise the call waits for
    /// budget, is dispatched with a hard timeout, and transient failures are
    /// retried with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::RateLimited` when budget never frees up in time,
    /// `GatewayError::Broker` for permanent failures, and
    /// `GatewayError::RetriesExhausted` or `GatewayError::Timeout` once
    /// transient failures outlast the retry policy.
    pub async fn call(
        &self,
        call: GatewayCall,
        priority: CallPriority,
    ) -> Result<GatewayResponse, GatewayError> {
        let method = call.method();
        let cache_key = call.cache_key();

        if let Some(key) = &cache_key {
            let hit = self.state.lock().cache.get(key, Instant::now());
            if let Some(response) = hit {
                tracing::debug!(method, key = %key, "Gateway cache hit");
                observability::record_cache_hit(method);
                return Ok(response);
            }
        }

        let response = self.dispatch_with_retry(&call, priority).await?;

        {
            let now = Instant::now();
            let mut state = self.state.lock();
            if let Some(key) = cache_key
                && response.is_cacheable()
            {
                state.cache.put(key, response.clone(), now);
            }
            if matches!(call, GatewayCall::SubmitOrder(_)) {
                state.cache.invalidate("get_balance:");
            }
        }

        Ok(response)
    }

    async fn dispatch_with_retry(
        &self,
        call: &GatewayCall,
        priority: CallPriority,
    ) -> Result<GatewayResponse, GatewayError> {
        let method = call.method();
        let mut backoff = ExponentialBackoffCalculator::new(&self.settings.retry);
        let mut attempts = 0u32;

        loop {
            self.acquire_slot(priority, method).await?;
            attempts += 1;

            let started = Instant::now();
            let outcome = tokio::time::timeout(self.settings.call_timeout, self.invoke(call)).await;
            let latency = started.elapsed().as_secs_f64();

            let error = match outcome {
                Ok(Ok(response)) => {
                    observability::record_gateway_call(method, priority.as_label(), "ok", latency);
                    return Ok(response);
                }
                Ok(Err(e)) => e,
                Err(_) => BrokerError::Timeout,
            };

            let label = match &error {
                BrokerError::RateLimited { .. } => "rate_limited",
                BrokerError::Timeout => "timeout",
                _ => "error",
            };
            observability::record_gateway_call(method, priority.as_label(), label, latency);

            if !error.is_transient() {
                tracing::debug!(method, error = %error, "Permanent broker error");
                return Err(GatewayError::Broker(error));
            }

            let retry_after = match &error {
                BrokerError::RateLimited { retry_after } => {
                    self.enter_cooldown(*retry_after);
                    *retry_after
                }
                _ => None,
            };

            let Some(delay) = backoff.next_backoff() else {
                tracing::error!(method, attempts, error = %error, "Gateway retries exhausted");
                return Err(match error {
                    BrokerError::Timeout => GatewayError::Timeout {
                        timeout: self.settings.call_timeout,
                    },
                    other => GatewayError::RetriesExhausted {
                        attempts,
                        last_error: other.to_string(),
                    },
                });
            };
            let delay = retry_after.map_or(delay, |server| server.max(delay));

            tracing::warn!(
                method,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient gateway failure, retrying"
            );
            observability::record_gateway_retry(method);
            tokio::time::sleep(delay).await;
        }
    }

    async fn invoke(&self, call: &GatewayCall) -> Result<GatewayResponse, BrokerError> {
        match call {
            GatewayCall::SubmitOrder(request) => self
                .broker
                .submit_order(request.clone())
                .await
                .map(GatewayResponse::Order),
            GatewayCall::GetOrder(id) => self.broker.get_order(id).await.map(GatewayResponse::Order),
            GatewayCall::GetBalance(asset) => self
                .broker
                .get_balance(asset)
                .await
                .map(GatewayResponse::Balance),
            GatewayCall::GetTicker(instrument) => self
                .broker
                .get_ticker(instrument)
                .await
                .map(GatewayResponse::Ticker),
        }
    }

    fn enter_cooldown(&self, retry_after: Option<Duration>) {
        let duration = retry_after.map_or(self.settings.rate_limit_cooldown, |server| {
            server.max(self.settings.rate_limit_cooldown)
        });
        self.state
            .lock()
            .budget
            .enter_cooldown(Instant::now(), duration);
        tracing::warn!(
            cooldown_ms = duration.as_millis() as u64,
            "Brokerage rate limit hit, deferring non-critical calls"
        );
        observability::record_rate_limit_cooldown();
    }

    /// Wait until this call may consume one unit of budget, then consume it.
    async fn acquire_slot(&self, priority: CallPriority, method: &str) -> Result<(), GatewayError> {
        if priority == CallPriority::Critical {
            self.acquire_critical(method).await
        } else {
            self.acquire_queued(priority, method).await
        }
    }

    /// CRITICAL calls skip the queue and the cooldown and poll the budget.
    async fn acquire_critical(&self, method: &str) -> Result<(), GatewayError> {
        let started = Instant::now();
        for poll in 0..=self.settings.critical_max_polls {
            {
                let now = Instant::now();
                let mut state = self.state.lock();
                if state.budget.has_capacity(now) {
                    state.budget.record(now);
                    return Ok(());
                }
            }
            if poll < self.settings.critical_max_polls {
                tracing::debug!(method, poll, "Budget exhausted, critical call polling");
                tokio::time::sleep(self.settings.critical_poll_interval).await;
            }
        }
        let waited = started.elapsed();
        tracing::error!(method, waited_ms = waited.as_millis() as u64, "Critical call starved of budget");
        Err(GatewayError::RateLimited { waited })
    }

    /// Lower priorities wait in the queue; only the head may dispatch.
    async fn acquire_queued(&self, priority: CallPriority, method: &str) -> Result<(), GatewayError> {
        let started = Instant::now();
        let deadline = self.settings.max_queue_wait.map(|wait| started + wait);
        let mut ticket: Option<QueueTicket<'_>> = None;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wake_at = {
                let now = Instant::now();
                let mut state = self.state.lock();
                let sequence = if let Some(ticket) = &ticket {
                    ticket.sequence
                } else {
                    let sequence = state.queue.push(priority);
                    ticket = Some(QueueTicket {
                        state: &self.state,
                        notify: &self.notify,
                        sequence,
                        armed: true,
                    });
                    sequence
                };

                let at_head = state.queue.head() == Some(sequence);
                if at_head && !state.budget.in_cooldown(now) && state.budget.has_capacity(now) {
                    state.queue.remove(sequence);
                    state.budget.record(now);
                    let depth = state.queue.len();
                    drop(state);
                    if let Some(ticket) = ticket.as_mut() {
                        ticket.armed = false;
                    }
                    observability::update_queue_depth(depth);
                    // Let the new head re-check the budget
                    self.notify.notify_waiters();
                    return Ok(());
                }

                let depth = state.queue.len();
                let wake_at = state.budget.next_change(now);
                drop(state);
                observability::update_queue_depth(depth);
                tracing::debug!(method, %priority, queue_depth = depth, at_head, "Waiting for gateway budget");
                wake_at
            };

            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                let waited = started.elapsed();
                tracing::warn!(method, %priority, waited_ms = waited.as_millis() as u64, "Gave up waiting for gateway budget");
                return Err(GatewayError::RateLimited { waited });
            }
            let wake_at = deadline.map_or(wake_at, |deadline| wake_at.min(deadline));
            let wake_at = wake_at.max(Instant::now());

            tokio::select! {
                () = &mut notified => {}
                () = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    fn unexpected(method: &str, response: &GatewayResponse) -> GatewayError {
        GatewayError::Broker(BrokerError::InvalidResponse {
            message: format!("{method} returned unexpected response {response:?}"),
        })
    }
}

#[async_trait]
impl<B> ExchangeGateway for RateLimitedGateway<B>
where
    B: BrokerPort,
{
    async fn submit_order(
        &self,
        request: SubmitOrderRequest,
        priority: CallPriority,
    ) -> Result<OrderSnapshot, GatewayError> {
        match self.call(GatewayCall::SubmitOrder(request), priority).await? {
            GatewayResponse::Order(snapshot) => Ok(snapshot),
            other => Err(Self::unexpected("submit_order", &other)),
        }
    }

    async fn get_order(
        &self,
        order_id: &ExternalOrderId,
        priority: CallPriority,
    ) -> Result<OrderSnapshot, GatewayError> {
        match self
            .call(GatewayCall::GetOrder(order_id.clone()), priority)
            .await?
        {
            GatewayResponse::Order(snapshot) => Ok(snapshot),
            other => Err(Self::unexpected("get_order", &other)),
        }
    }

    async fn get_balance(
        &self,
        asset: &str,
        priority: CallPriority,
    ) -> Result<Decimal, GatewayError> {
        match self
            .call(GatewayCall::GetBalance(asset.to_string()), priority)
            .await?
        {
            GatewayResponse::Balance(balance) => Ok(balance),
            other => Err(Self::unexpected("get_balance", &other)),
        }
    }

    async fn get_ticker(
        &self,
        instrument: &InstrumentId,
        priority: CallPriority,
    ) -> Result<Ticker, GatewayError> {
        match self
            .call(GatewayCall::GetTicker(instrument.clone()), priority)
            .await?
        {
            GatewayResponse::Ticker(ticker) => Ok(ticker),
            other => Err(Self::unexpected("get_ticker", &other)),
        }
    }
}
