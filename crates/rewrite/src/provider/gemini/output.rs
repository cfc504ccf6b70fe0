use serde::Deserialize;

/// Response body of the Gemini `generateContent` method.
///
/// Only the fields needed to reach the generated text are modelled. Every level is
/// optional so that a missing field surfaces as "no text" instead of a parse error.
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].text`, trimmed.
    pub(crate) fn into_text(self) -> Option<String> {
        let text = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text?;

        Some(text.trim().to_string())
    }
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub(crate) reason: Option<String>,
}

impl ErrorResponse {
    /// Whether Google rejected the request because of the API key.
    pub(crate) fn is_invalid_api_key(&self) -> bool {
        let reason_matches = self
            .error
            .details
            .iter()
            .any(|detail| detail.reason.as_deref() == Some("API_KEY_INVALID"));

        reason_matches || self.error.message.to_ascii_lowercase().contains("api key")
    }
}
