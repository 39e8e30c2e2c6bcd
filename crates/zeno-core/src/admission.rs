//! Per-client admission control.
//!
//! A sliding-window request cap keyed by client identity (the remote IP at
//! the HTTP layer). It runs before a turn reaches the orchestrator and holds
//! no state the orchestrator depends on.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// The caller exceeded its request budget for the current window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded, retry in {retry_after:?}")]
pub struct RateLimited {
    pub retry_after: Duration,
}

/// Sliding-window limiter: at most `max_requests` admitted per key within
/// any `window`.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: DashMap::new(),
        }
    }

    /// Admit or reject one request for `key` now.
    pub fn check(&self, key: &str) -> Result<(), RateLimited> {
        self.check_at(key, Instant::now())
    }

    /// Admit or reject one request for `key` at `now`.
    ///
    /// Rejected requests do not count against the window.
    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimited> {
        let mut entry = self.hits.entry(key.to_string()).or_default();
        let hits = entry.value_mut();

        while let Some(oldest) = hits.front() {
            if now.duration_since(*oldest) >= self.window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() >= self.max_requests as usize {
            let retry_after = hits
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(RateLimited { retry_after });
        }

        hits.push_back(now);
        Ok(())
    }

    /// Drop keys with no hits inside the window. Returns how many were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.hits.len();
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|newest| now.duration_since(*newest) < self.window)
        });
        before - self.hits.len()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}
