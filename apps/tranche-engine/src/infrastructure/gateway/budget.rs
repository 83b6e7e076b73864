//! Rolling call budget and post-429 cooldown.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Dispatch instants over a trailing window, plus a cooldown deadline.
#[derive(Debug)]
pub(super) struct RateBudget {
    limit: usize,
    window: Duration,
    dispatched: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
}

impl RateBudget {
    pub(super) fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1) as usize,
            window,
            dispatched: VecDeque::new(),
            cooldown_until: None,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.dispatched.front() {
            if *oldest + self.window <= now {
                self.dispatched.pop_front();
            } else {
                break;
            }
        }
        if self.cooldown_until.is_some_and(|until| until <= now) {
            self.cooldown_until = None;
        }
    }

    /// Calls dispatched in the trailing window.
    pub(super) fn used(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.dispatched.len()
    }

    pub(super) fn has_capacity(&mut self, now: Instant) -> bool {
        self.used(now) < self.limit
    }

    pub(super) fn record(&mut self, now: Instant) {
        self.dispatched.push_back(now);
    }

    pub(super) fn in_cooldown(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.cooldown_until.is_some()
    }

    pub(super) fn cooldown_remaining(&mut self, now: Instant) -> Duration {
        self.prune(now);
        self.cooldown_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    /// Extend (never shorten) the cooldown to `now + duration`.
    pub(super) fn enter_cooldown(&mut self, now: Instant, duration: Duration) {
        let until = now + duration;
        if self.cooldown_until.is_none_or(|current| current < until) {
            self.cooldown_until = Some(until);
        }
    }

    /// Earliest instant at which a blocked non-critical call could proceed.
    pub(super) fn next_change(&mut self, now: Instant) -> Instant {
        self.prune(now);
        let slot_free = if self.dispatched.len() < self.limit {
            now
        } else {
            self.dispatched
                .front()
                .map_or(now, |oldest| *oldest + self.window)
        };
        self.cooldown_until
            .map_or(slot_free, |until| until.max(slot_free))
    }
}
