//! Liveness endpoint configuration.

use std::{borrow::Cow, net::SocketAddr};

use serde::Deserialize;

/// Liveness endpoint answering `{"status": "healthy"}`.
///
/// Served next to the transform routes unless `listen` moves it to its own listener.
/// It is never rate limited.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the endpoint is served at all.
    pub enabled: bool,
    /// Separate address for the endpoint, e.g. for a load balancer on an internal interface.
    pub listen: Option<SocketAddr>,
    /// Path of the endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: None,
            path: Cow::Borrowed("/health"),
        }
    }
}
