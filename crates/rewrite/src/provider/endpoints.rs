use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;

/// Ordered upstream endpoints and the one new calls start from.
///
/// The cursor starts at the primary endpoint and moves to a fallback once that
/// fallback answered after the endpoints before it returned 404.
pub(crate) struct EndpointCandidates {
    urls: Vec<Url>,
    cursor: AtomicUsize,
}

impl EndpointCandidates {
    /// `urls` must not be empty.
    pub fn new(urls: Vec<Url>) -> Self {
        Self {
            urls,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Index of the endpoint new calls start from.
    pub fn current(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// The endpoint `offset` places after the current one, wrapping around.
    pub fn nth_from(&self, start: usize, offset: usize) -> (usize, &Url) {
        let index = (start + offset) % self.urls.len();
        (index, &self.urls[index])
    }

    /// Make `index` the starting endpoint of later calls.
    pub fn promote(&self, index: usize) {
        let previous = self.cursor.swap(index, Ordering::Relaxed);

        if previous != index {
            log::info!(
                "Switching default upstream endpoint to {}",
                super::redact_url(&self.urls[index])
            );
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.urls.iter()
    }
}
