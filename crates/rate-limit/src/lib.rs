//! Rate limiting functionality for Uplift.
//!
//! Every client gets a sliding window of request timestamps. A request is admitted
//! when fewer than the configured maximum of admitted requests fall inside the
//! trailing window. Rejected requests are not recorded.
//!
//! The window arithmetic lives in [`SlidingWindow`] and has no storage dependency.
//! Storage is pluggable through [`RateLimitStorage`]; [`InMemoryStorage`] keeps the
//! windows of a single process.

#![deny(missing_docs)]

mod error;
mod identity;
mod manager;
mod storage;
mod window;

pub use error::RateLimitError;
pub use identity::ClientIdentity;
pub use manager::RateLimitManager;
pub use storage::{InMemoryStorage, RateLimitResult, RateLimitStorage, StorageError};
pub use window::SlidingWindow;
