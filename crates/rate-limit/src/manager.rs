//! Rate limit manager implementation.

use std::sync::Arc;

use config::RateLimitConfig;
use tokio::time::Instant;

use crate::error::RateLimitError;
use crate::identity::ClientIdentity;
use crate::storage::{InMemoryStorage, RateLimitStorage};

/// Applies the configured per-client limit to incoming requests.
pub struct RateLimitManager {
    config: RateLimitConfig,
    storage: Arc<dyn RateLimitStorage>,
}

impl RateLimitManager {
    /// Create a manager keeping its windows in process memory.
    pub fn new(config: RateLimitConfig) -> Self {
        let storage = Arc::new(InMemoryStorage::new(config.window, config.max_clients));
        Self::with_storage(config, storage)
    }

    /// Create a manager with a custom storage backend.
    pub fn with_storage(config: RateLimitConfig, storage: Arc<dyn RateLimitStorage>) -> Self {
        Self { config, storage }
    }

    /// Check if rate limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Admit or reject one request of `identity`, recording it when admitted.
    pub async fn check(&self, identity: &ClientIdentity) -> Result<(), RateLimitError> {
        if !self.is_enabled() {
            return Ok(());
        }

        let key = format!("client:{identity}");

        let result = self
            .storage
            .check_and_record(&key, Instant::now(), self.config.window, self.config.max_requests)
            .await?;

        if !result.allowed {
            return Err(RateLimitError::LimitExceeded {
                retry_after: result.retry_after.unwrap_or(self.config.window),
            });
        }

        Ok(())
    }
}
