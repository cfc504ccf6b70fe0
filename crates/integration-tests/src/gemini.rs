//! A scripted stand-in for the Gemini `generateContent` API.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::Instant;

/// Prefix the mock puts in front of the user text of a default reply.
pub const REPLY_PREFIX: &str = "Bright side: ";

/// One scripted answer of the mock.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with the given text as the first candidate.
    Generated(String),
    /// Any status with a raw body.
    Status(u16, String),
    /// Never answer within any reasonable timeout.
    Hang,
}

impl MockReply {
    /// 429 as Google sends it.
    pub fn rate_limited() -> Self {
        Self::Status(
            429,
            json!({
                "error": {
                    "code": 429,
                    "message": "Resource has been exhausted (e.g. check quota).",
                    "status": "RESOURCE_EXHAUSTED"
                }
            })
            .to_string(),
        )
    }

    /// 400 rejecting the API key as Google sends it.
    pub fn invalid_api_key() -> Self {
        Self::Status(
            400,
            json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT",
                    "details": [{
                        "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                        "reason": "API_KEY_INVALID"
                    }]
                }
            })
            .to_string(),
        )
    }
}

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub received_at: Instant,
    /// Value of the `x-goog-api-key` header.
    pub header_key: Option<String>,
    /// Value of the `key` query parameter.
    pub query_key: Option<String>,
    pub body: serde_json::Value,
}

impl RecordedRequest {
    /// The rendered prompt sent upstream.
    pub fn prompt(&self) -> &str {
        self.body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default()
    }
}

/// Builder of a mock server.
pub struct GeminiMock {
    models: Vec<String>,
    scripts: HashMap<String, VecDeque<MockReply>>,
}

impl Default for GeminiMock {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiMock {
    /// A mock serving `gemini-1.5-flash` and `gemini-pro`.
    pub fn new() -> Self {
        Self::with_models(&["gemini-1.5-flash", "gemini-pro"])
    }

    /// A mock serving exactly `models`. Every other model answers 404.
    pub fn with_models(models: &[&str]) -> Self {
        Self {
            models: models.iter().map(|model| model.to_string()).collect(),
            scripts: HashMap::new(),
        }
    }

    /// Queue a reply for the next unanswered request to `model`. Once the queue is
    /// empty the model answers with a default reply.
    pub fn reply(mut self, model: &str, reply: MockReply) -> Self {
        self.scripts.entry(model.to_string()).or_default().push_back(reply);
        self
    }

    /// Queue the same reply `times` times.
    pub fn reply_times(mut self, model: &str, reply: MockReply, times: usize) -> Self {
        for _ in 0..times {
            self = self.reply(model, reply.clone());
        }

        self
    }

    pub async fn spawn(self) -> TestGemini {
        let state = Arc::new(MockState {
            models: self.models,
            scripts: Mutex::new(self.scripts),
            requests: Mutex::new(Vec::new()),
            abandoned: Arc::new(AtomicUsize::new(0)),
        });

        let app = Router::new()
            .route("/v1beta/models/{*path}", post(generate_content))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestGemini { address, state }
    }
}

struct MockState {
    models: Vec<String>,
    scripts: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    /// Hanging replies whose handler was dropped before answering.
    abandoned: Arc<AtomicUsize>,
}

/// Counts the handler as abandoned unless disarmed.
struct AbandonGuard {
    abandoned: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A running mock.
#[derive(Clone)]
pub struct TestGemini {
    pub address: SocketAddr,
    state: Arc<MockState>,
}

impl TestGemini {
    /// The generateContent URL of `model` on this mock.
    pub fn endpoint(&self, model: &str) -> String {
        format!("http://{}/v1beta/models/{model}:generateContent", self.address)
    }

    /// The URLs of all served models, in order.
    pub fn endpoints(&self) -> Vec<String> {
        self.state.models.iter().map(|model| self.endpoint(model)).collect()
    }

    /// All received requests, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Number of [`MockReply::Hang`] requests the client gave up on, which the server
    /// noticed by dropping the handler.
    pub fn abandoned_requests(&self) -> usize {
        self.state.abandoned.load(Ordering::SeqCst)
    }

    /// Models of all received requests, oldest first.
    pub fn requested_models(&self) -> Vec<String> {
        self.requests().into_iter().map(|request| request.model).collect()
    }
}

async fn generate_content(
    State(state): State<Arc<MockState>>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let model = path.strip_suffix(":generateContent").unwrap_or(&path).to_string();

    let request = RecordedRequest {
        model: model.clone(),
        received_at: Instant::now(),
        header_key: headers
            .get("x-goog-api-key")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        query_key: query.get("key").cloned(),
        body: serde_json::from_str(&body).unwrap_or(serde_json::Value::Null),
    };

    let prompt = request.prompt().to_string();
    state.requests.lock().unwrap().push(request);

    if !state.models.contains(&model) {
        let body = json!({
            "error": {
                "code": 404,
                "message": format!("models/{model} is not found for API version v1beta"),
                "status": "NOT_FOUND"
            }
        });

        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    }

    let scripted = state
        .scripts
        .lock()
        .unwrap()
        .get_mut(&model)
        .and_then(|queue| queue.pop_front());

    let reply = scripted.unwrap_or_else(|| MockReply::Generated(default_reply(&prompt)));

    match reply {
        MockReply::Generated(text) => {
            let body = json!({
                "candidates": [{
                    "content": { "parts": [{ "text": text }], "role": "model" },
                    "finishReason": "STOP",
                    "index": 0
                }],
                "modelVersion": model
            });

            (StatusCode::OK, Json(body)).into_response()
        }
        MockReply::Status(status, body) => {
            let status = StatusCode::from_u16(status).unwrap();
            (status, [("content-type", "application/json")], body).into_response()
        }
        MockReply::Hang => {
            let mut guard = AbandonGuard {
                abandoned: state.abandoned.clone(),
                armed: true,
            };

            tokio::time::sleep(Duration::from_secs(3600)).await;
            guard.armed = false;

            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    }
}

/// The user text at the end of the prompt, prefixed and padded with whitespace.
fn default_reply(prompt: &str) -> String {
    let text = prompt.rsplit_once("Text:\n").map(|(_, text)| text).unwrap_or(prompt);
    format!("\n  {REPLY_PREFIX}{text}  \n")
}
