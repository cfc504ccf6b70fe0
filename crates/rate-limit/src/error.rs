//! Error types for rate limiting.

use crate::storage::StorageError;
use std::time::Duration;

/// Errors that can occur during rate limiting.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The client used up its requests for the current window.
    #[error("Rate limit exceeded")]
    LimitExceeded {
        /// Time until the oldest request of the window expires.
        retry_after: Duration,
    },

    /// Storage backend error.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RateLimitError {
    /// Get the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::LimitExceeded { retry_after } => Some(*retry_after),
            Self::Storage(_) => None,
        }
    }
}
