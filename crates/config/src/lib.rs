//! Uplift configuration structures to map the uplift.toml configuration.

#![deny(missing_docs)]

mod client_identity;
mod cors;
mod health;
mod loader;
mod rate_limit;
mod server;
mod tls;
mod transform;
mod upstream;

use std::path::Path;

pub use client_identity::ClientIdentityConfig;
pub use cors::*;
pub use health::HealthConfig;
pub use rate_limit::RateLimitConfig;
use serde::Deserialize;
pub use server::{SecurityHeadersConfig, ServerConfig};
pub use tls::TlsServerConfig;
pub use transform::TransformConfig;
pub use upstream::{API_KEY_PLACEHOLDER, CredentialLocation, GenerationConfig, SafetySetting, UpstreamConfig};

/// Main configuration structure for the Uplift application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Transform endpoint settings.
    #[serde(default)]
    pub transform: TransformConfig,
    /// Upstream Gemini API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the configured values, returning warnings for suspicious but usable settings.
    pub fn validate(&self) -> anyhow::Result<Vec<String>> {
        loader::validate(self)
    }
}
