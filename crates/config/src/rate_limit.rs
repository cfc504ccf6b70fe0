//! Rate limiting configuration structures.

use duration_str::deserialize_duration;
use serde::Deserialize;
use std::time::Duration;

/// Per-client sliding window rate limiting for the transform endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// Maximum number of admitted requests per client within the window.
    pub max_requests: u32,
    /// Length of the trailing window.
    #[serde(deserialize_with = "deserialize_duration")]
    pub window: Duration,
    /// Upper bound of clients tracked at once. When more clients are active within
    /// one window, some of them are evicted and start over with an
    /// empty window, so they may get more than `max_requests` through. Size it above
    /// the expected number of distinct clients per window.
    pub max_clients: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window: Duration::from_secs(60),
            max_clients: 100_000,
        }
    }
}
