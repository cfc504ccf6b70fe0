use axum::http::HeaderMap;
use secrecy::SecretString;

/// Header name for caller provided API keys.
pub(crate) const API_KEY_HEADER: &str = "X-Gemini-Api-Key";

/// Per request values that may override the configuration.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestContext {
    /// Key sent by the caller. Only used when key forwarding is enabled.
    pub api_key: Option<SecretString>,
}

/// Extract the request context from the request headers. Blank keys are ignored.
pub(crate) fn extract_context(headers: &HeaderMap) -> RequestContext {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| SecretString::from(key.to_string()));

    RequestContext { api_key }
}
