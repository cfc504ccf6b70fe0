//! HTTP server configuration settings.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::{ClientIdentityConfig, CorsConfig, HealthConfig, RateLimitConfig, TlsServerConfig};

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// TLS configuration for secure connections.
    pub tls: Option<TlsServerConfig>,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
    /// CORS configuration
    pub cors: Option<CorsConfig>,
    /// Protective response headers.
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,
    /// How clients are identified for rate limiting.
    #[serde(default)]
    pub client_identity: ClientIdentityConfig,
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

/// Adds `X-Content-Type-Options`, `X-Frame-Options` and `X-XSS-Protection` to every response.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityHeadersConfig {
    /// Whether the headers are added.
    pub enabled: bool,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
