//! The text rewriting API of Uplift.
//!
//! Caller text is validated, wrapped into a rewriting instruction and sent to the Gemini
//! `generateContent` method. Upstream rate limiting is retried with a linear backoff and
//! missing models fall back to the next configured endpoint. Every failure is reported
//! as one of the [`ErrorKind`]s.

use axum::{
    Router,
    extract::{Extension, Json, State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use config::{Config, UpstreamConfig};
use rate_limit::ClientIdentity;
use serde::{Deserialize, Serialize};

mod error;
mod prompt;
mod provider;
mod request;
mod server;

pub use error::{ErrorDescriptor, ErrorKind, TransformError};
pub use provider::{gemini::EndpointProbe, redact_url};

use provider::gemini::GeminiClient;
use server::TransformServer;

pub(crate) type Result<T> = std::result::Result<T, TransformError>;

/// Creates an axum router with the transform and status endpoints.
pub fn router(config: &Config) -> anyhow::Result<Router> {
    let server = TransformServer::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize transform server: {e}"))?;

    let routes = Router::new()
        .route("/transform", post(transform))
        .route("/status", get(status))
        .with_state(server);

    Ok(Router::new().nest(&config.transform.path, routes))
}

/// Send a minimal request to every configured endpoint with the configured key.
pub async fn probe(config: &UpstreamConfig) -> anyhow::Result<Vec<EndpointProbe>> {
    let Some(api_key) = config.configured_api_key() else {
        anyhow::bail!("Probing needs upstream.api_key to be configured");
    };

    let client = GeminiClient::new(config)?;

    Ok(client.probe(api_key).await)
}

#[derive(Debug, Deserialize)]
struct TransformRequest {
    /// Anything but a string is treated as missing text.
    #[serde(default)]
    text: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransformResponse {
    transformed_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: &'static str,
    api_configured: bool,
    timestamp: String,
}

/// Handle transform requests.
///
/// A body that cannot be read as JSON carries no text. It still goes through the rate
/// limit and is then rejected as empty input.
async fn transform(
    State(server): State<TransformServer>,
    headers: HeaderMap,
    identity: Option<Extension<ClientIdentity>>,
    request: std::result::Result<Json<TransformRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let identity = identity.map(|Extension(identity)| identity).unwrap_or_else(ClientIdentity::unknown);
    let context = request::extract_context(&headers);

    let text = match &request {
        Ok(Json(request)) => request.text.as_str().unwrap_or_default(),
        Err(rejection) => {
            log::debug!(
                "Unreadable transform body from '{identity}' ({}): {rejection}",
                rejection.status().as_u16()
            );

            ""
        }
    };

    log::debug!(
        "Transform requested by '{identity}' with {} characters",
        text.chars().count()
    );

    let transformed_text = server.transform(text, &identity, &context).await?;

    Ok(Json(TransformResponse { transformed_text }))
}

/// Report whether the service has an upstream key configured.
async fn status(State(server): State<TransformServer>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok",
        api_configured: server.api_configured(),
        timestamp: jiff::Timestamp::now().to_string(),
    })
}
