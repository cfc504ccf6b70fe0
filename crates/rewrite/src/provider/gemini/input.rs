use config::{GenerationConfig, SafetySetting};
use serde::Serialize;

/// Request body of the Gemini `generateContent` method.
///
/// See the [Google AI API Reference](https://ai.google.dev/api/generate-content).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    /// A single user turn holding the rendered prompt.
    pub(crate) contents: Vec<Content>,

    /// Sampling parameters. Omitted in probe requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) generation_config: Option<GeminiGenerationConfig>,

    /// Blocking thresholds per harm category, in configuration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) safety_settings: Vec<GeminiSafetySetting>,
}

impl GenerateRequest {
    /// A request with a single text part and no optional fields.
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: text.into() }],
            }],
            generation_config: None,
            safety_settings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Content {
    pub(crate) parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Part {
    pub(crate) text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiGenerationConfig {
    pub(crate) temperature: f32,
    pub(crate) top_k: u32,
    pub(crate) top_p: f32,
    pub(crate) max_output_tokens: u32,
}

impl From<&GenerationConfig> for GeminiGenerationConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GeminiSafetySetting {
    pub(crate) category: String,
    pub(crate) threshold: String,
}

impl From<&SafetySetting> for GeminiSafetySetting {
    fn from(setting: &SafetySetting) -> Self {
        Self {
            category: setting.category.clone(),
            threshold: setting.threshold.clone(),
        }
    }
}
