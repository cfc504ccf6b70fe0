//! Turns caller text into an upstream generation request.

use config::{TransformConfig, UpstreamConfig};

use crate::{
    error::{ErrorKind, TransformError},
    provider::gemini::{GeminiGenerationConfig, GeminiSafetySetting, GenerateRequest},
};

/// Validates caller text and wraps it into the rewriting instruction.
pub(crate) struct RequestBuilder {
    max_input_length: usize,
    response_language: String,
    generation_config: GeminiGenerationConfig,
    safety_settings: Vec<GeminiSafetySetting>,
}

impl RequestBuilder {
    pub fn new(transform: &TransformConfig, upstream: &UpstreamConfig) -> Self {
        Self {
            max_input_length: transform.max_input_length,
            response_language: transform.response_language.clone(),
            generation_config: GeminiGenerationConfig::from(&upstream.generation),
            safety_settings: upstream.safety_settings.iter().map(GeminiSafetySetting::from).collect(),
        }
    }

    /// Build the upstream request for `text`.
    ///
    /// Blank text is rejected with [`ErrorKind::EmptyInput`]. Text with more characters
    /// than allowed is rejected with [`ErrorKind::InputTooLong`]; the length is counted
    /// on the text as sent, surrounding whitespace included.
    pub fn build(&self, text: &str) -> crate::Result<GenerateRequest> {
        if text.trim().is_empty() {
            return Err(TransformError::new(ErrorKind::EmptyInput));
        }

        let length = text.chars().count();

        if length > self.max_input_length {
            return Err(TransformError::new(ErrorKind::InputTooLong)
                .with_detail(format!("{length} characters, at most {} allowed", self.max_input_length)));
        }

        let mut request = GenerateRequest::text(render_prompt(text, &self.response_language));
        request.generation_config = Some(self.generation_config.clone());
        request.safety_settings = self.safety_settings.clone();

        Ok(request)
    }
}

fn render_prompt(text: &str, response_language: &str) -> String {
    format!(
        "Rewrite the following text so that it reads more positively.\n\
         Keep the original meaning and do not add new facts.\n\
         Make the result concise and encouraging, and write it in {response_language}.\n\
         Reply with the rewritten text only.\n\
         \n\
         Text:\n\
         {text}"
    )
}
