//! Sliding window admission control.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::storage::RateLimitResult;

/// Timestamps of the admitted requests of one client, oldest first.
///
/// Entries are pruned lazily on every check, so the window never holds more than
/// `max_requests` timestamps.
#[derive(Debug, Default)]
pub struct SlidingWindow {
    timestamps: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a request arriving at `now` is admitted.
    ///
    /// Timestamps at least `window` old are dropped first. The request is rejected
    /// when `max_requests` timestamps remain, and recorded otherwise.
    pub fn admit(&mut self, now: Instant, window: Duration, max_requests: u32) -> RateLimitResult {
        // Callers may read the clock before waiting on the lock of this window.
        let now = match self.timestamps.back() {
            Some(last) if *last > now => *last,
            _ => now,
        };

        self.prune(now, window);

        if self.timestamps.len() >= max_requests as usize {
            let retry_after = self
                .timestamps
                .front()
                .map(|oldest| (*oldest + window).saturating_duration_since(now))
                .unwrap_or(window);

            return RateLimitResult {
                allowed: false,
                retry_after: Some(retry_after),
            };
        }

        self.timestamps.push_back(now);

        RateLimitResult {
            allowed: true,
            retry_after: None,
        }
    }

    /// Number of requests currently counted against the window.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no request is counted against the window.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) < window {
                break;
            }

            self.timestamps.pop_front();
        }
    }
}
