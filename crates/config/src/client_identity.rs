//! How the rate limiting identity of a caller is derived.

use serde::Deserialize;

/// Client identification settings.
///
/// Headers are consulted in order and the first non-empty value wins. When none is
/// present, the peer address of the connection is used. Header values are not verified
/// in any way, so a caller can pick its own bucket by setting one of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientIdentityConfig {
    /// Request headers carrying the client identity, e.g. a proxy supplied client IP
    /// or an application token.
    pub trusted_headers: Vec<String>,
}

impl Default for ClientIdentityConfig {
    fn default() -> Self {
        Self {
            trusted_headers: vec![
                "cf-connecting-ip".to_string(),
                "x-forwarded-for".to_string(),
                "x-real-ip".to_string(),
            ],
        }
    }
}
