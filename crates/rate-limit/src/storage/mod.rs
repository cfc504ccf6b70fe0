//! Storage backends for rate limiting.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

pub mod memory;

pub use memory::InMemoryStorage;

/// Result type for rate limit checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is allowed.
    pub allowed: bool,
    /// Time to wait before retrying if not allowed.
    pub retry_after: Option<Duration>,
}

/// Trait for rate limit storage backends.
///
/// Implementations must make the prune, check and record steps for one key atomic
/// with respect to concurrent calls for the same key. Calls for different keys must
/// not wait on each other.
#[async_trait]
pub trait RateLimitStorage: Send + Sync {
    /// Check the window of `key` at `now` and record the request if it is admitted.
    async fn check_and_record(
        &self,
        key: &str,
        now: Instant,
        window: Duration,
        max_requests: u32,
    ) -> Result<RateLimitResult, StorageError>;
}

/// Errors that can occur in storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Internal storage error.
    #[error("Storage error: {0}")]
    Internal(String),
}
