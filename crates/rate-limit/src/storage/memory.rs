//! In-memory rate limit storage.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use mini_moka::sync::Cache;
use tokio::time::Instant;

use super::{RateLimitResult, RateLimitStorage, StorageError};
use crate::window::SlidingWindow;

/// Windows of a single process. State is lost on restart and is not shared between
/// instances.
pub struct InMemoryStorage {
    /// Window per key. Keys idle for longer than the window are evicted, at which
    /// point all their timestamps would have expired anyway. Keys evicted because the
    /// capacity is reached lose their timestamps early and start with an empty window.
    windows: Cache<String, Arc<Mutex<SlidingWindow>>>,
    /// Lock to prevent two concurrent first requests of a key from creating two
    /// windows.
    creation_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl InMemoryStorage {
    /// Create a storage evicting keys idle for longer than `time_to_idle`, tracking at
    /// most `max_keys` keys at once.
    pub fn new(time_to_idle: Duration, max_keys: u64) -> Self {
        let windows = Cache::builder()
            .max_capacity(max_keys)
            .time_to_idle(time_to_idle)
            .build();

        Self {
            windows,
            creation_locks: DashMap::new(),
        }
    }

    async fn window_for(&self, key: &str) -> Arc<Mutex<SlidingWindow>> {
        let key = key.to_string();

        if let Some(window) = self.windows.get(&key) {
            return window;
        }

        let creation_lock = self
            .creation_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();

        let guard = creation_lock.lock().await;

        // Another request may have created the window while we were waiting.
        let window = match self.windows.get(&key) {
            Some(window) => window,
            None => {
                log::debug!("Creating rate limit window for key '{key}'");

                let window = Arc::new(Mutex::new(SlidingWindow::new()));
                self.windows.insert(key.clone(), window.clone());

                window
            }
        };

        drop(guard);
        self.creation_locks.remove(&key);

        window
    }
}

#[async_trait]
impl RateLimitStorage for InMemoryStorage {
    async fn check_and_record(
        &self,
        key: &str,
        now: Instant,
        window: Duration,
        max_requests: u32,
    ) -> Result<RateLimitResult, StorageError> {
        let sliding_window = self.window_for(key).await;

        let result = {
            let mut sliding_window = sliding_window
                .lock()
                .map_err(|_| StorageError::Internal(format!("Rate limit window for '{key}' is poisoned")))?;

            sliding_window.admit(now, window, max_requests)
        };

        if result.allowed {
            log::debug!("Request allowed for key '{key}' - within rate limit");
        } else {
            log::debug!(
                "Request blocked for key '{key}' - rate limit exceeded, retry after {:?}",
                result.retry_after
            );
        }

        Ok(result)
    }
}
