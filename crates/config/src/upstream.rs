//! Upstream generative language API configuration.

use std::time::Duration;

use duration_str::deserialize_duration;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

/// Value shipped in example configurations. Treated as if no key was set.
pub const API_KEY_PLACEHOLDER: &str = "YOUR_GEMINI_API_KEY_HERE";

const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent",
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent",
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent",
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent",
];

/// Configuration of the upstream Gemini API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Shared API key used for all upstream requests.
    pub api_key: Option<SecretString>,
    /// Where the key is placed in the upstream request.
    pub credential_location: CredentialLocation,
    /// Allow callers to send their own key in the `X-Gemini-Api-Key` header.
    pub forward_key: bool,
    /// Ordered list of generateContent endpoints. The first one is the primary,
    /// the rest are tried in order when an endpoint answers 404.
    pub endpoints: Vec<Url>,
    /// Timeout of a single upstream attempt.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// How many times a request answered with 429 is retried.
    pub max_retries: u32,
    /// Base delay of the linear retry backoff.
    #[serde(deserialize_with = "deserialize_duration")]
    pub retry_delay: Duration,
    /// Sampling parameters sent with every request.
    pub generation: GenerationConfig,
    /// Safety thresholds sent with every request, in order.
    pub safety_settings: Vec<SafetySetting>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            credential_location: CredentialLocation::default(),
            forward_key: false,
            endpoints: default_endpoints(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            generation: GenerationConfig::default(),
            safety_settings: default_safety_settings(),
        }
    }
}

impl UpstreamConfig {
    /// The configured API key, ignoring empty values and the example placeholder.
    pub fn configured_api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref().filter(|key| {
            let key = key.expose_secret().trim();
            !key.is_empty() && key != API_KEY_PLACEHOLDER
        })
    }

    /// Whether requests can reach the upstream with some credential.
    pub fn has_credential_source(&self) -> bool {
        self.forward_key || self.configured_api_key().is_some()
    }
}

/// Placement of the API key in upstream requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialLocation {
    /// `x-goog-api-key` request header.
    #[default]
    Header,
    /// `key` query parameter.
    Query,
}

/// Sampling parameters of the generation request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Controls randomness of the output.
    pub temperature: f32,
    /// Number of most probable tokens considered when sampling.
    pub top_k: u32,
    /// Cumulative probability cut-off for nucleus sampling.
    pub top_p: f32,
    /// Upper bound of generated tokens.
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

/// A harm category and the threshold at which content of that category is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetySetting {
    /// e.g. `HARM_CATEGORY_HARASSMENT`.
    pub category: String,
    /// e.g. `BLOCK_MEDIUM_AND_ABOVE`.
    pub threshold: String,
}

fn default_endpoints() -> Vec<Url> {
    DEFAULT_ENDPOINTS
        .iter()
        .filter_map(|endpoint| Url::parse(endpoint).ok())
        .collect()
}

fn default_safety_settings() -> Vec<SafetySetting> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category: category.to_string(),
        threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
    })
    .collect()
}
