//! Short-TTL response cache keyed by call.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::call::GatewayResponse;

#[derive(Debug)]
pub(super) struct ResponseCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, GatewayResponse)>,
}

impl ResponseCache {
    pub(super) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub(super) fn get(&mut self, key: &str, now: Instant) -> Option<GatewayResponse> {
        match self.entries.get(key) {
            Some((stored, response)) if now.duration_since(*stored) < self.ttl => {
                Some(response.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub(super) fn put(&mut self, key: String, response: GatewayResponse, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(key, (now, response));
    }

    /// Drop every entry whose key starts with `prefix`.
    pub(super) fn invalidate(&mut self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub(super) fn len(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored, _)| now.duration_since(*stored) < ttl);
        self.entries.len()
    }
}
