//! Transform endpoint configuration.

use std::borrow::Cow;

use serde::Deserialize;

/// Configuration of the transform API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// The path where the transform and status endpoints are mounted.
    pub path: Cow<'static, str>,
    /// Maximum accepted input length, in characters.
    pub max_input_length: usize,
    /// Language the rewritten text must be written in.
    pub response_language: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            path: Cow::Borrowed("/api"),
            max_input_length: 5000,
            response_language: "English".to_string(),
        }
    }
}
