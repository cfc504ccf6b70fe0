use std::net::SocketAddr;
use std::time::Duration;

use config::Config;
use server::ServeConfig;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub mod gemini;

pub use gemini::{GeminiMock, MockReply, RecordedRequest, TestGemini};

/// API key the test server is configured with unless a test opts out.
pub const TEST_API_KEY: &str = "AIzaIntegrationTestKey";

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a POST request to the given path with JSON body
    pub async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    /// Start building a request with custom headers.
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// POST `{"text": text}` to the default transform endpoint.
    pub async fn transform(&self, text: &str) -> TransformResponse {
        let response = self.post("/api/transform", &serde_json::json!({ "text": text })).await;
        TransformResponse::read(response).await
    }

    /// Like [`Self::transform`], with one extra request header.
    pub async fn transform_with_header(&self, text: &str, name: &str, value: &str) -> TransformResponse {
        let response = self
            .request(reqwest::Method::POST, "/api/transform")
            .header(name, value)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .unwrap();

        TransformResponse::read(response).await
    }
}

/// Status and JSON body of a transform call.
#[derive(Debug)]
pub struct TransformResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl TransformResponse {
    async fn read(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.json().await.unwrap();

        Self { status, body }
    }

    /// The `code` of an error response.
    pub fn code(&self) -> Option<&str> {
        self.body["code"].as_str()
    }

    /// The `transformedText` of a successful response.
    pub fn text(&self) -> Option<&str> {
        self.body["transformedText"].as_str()
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    shutdown: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl TestServer {
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    /// Start a new test server with the given TOML configuration
    pub async fn start(config_toml: &str) -> Self {
        let config: Config = toml::from_str(config_toml).unwrap();
        Self::start_with_config(config).await
    }

    async fn start_with_config(config: Config) -> Self {
        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
            shutdown: shutdown.clone(),
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            let _ = tx.send(server::serve(serve_config).await);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        if let Ok(Err(e)) = rx.try_recv() {
            eprintln!("Server failed to start: {e}");
            std::process::exit(1);
        }

        let client = TestClient::new(format!("http://{address}"));

        // Verify the server is actually running by making a simple request
        let mut retries = 10;

        while retries > 0 {
            if let Ok(Ok(_)) = timeout(
                Duration::from_millis(100),
                reqwest::get(format!("http://{address}/")),
            )
            .await
            {
                break;
            }

            retries -= 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestServer {
            client,
            address,
            shutdown,
        }
    }
}

/// Starts a server wired to spawned Gemini mocks.
#[derive(Default)]
pub struct TestServerBuilder {
    endpoints: Vec<String>,
    without_api_key: bool,
}

impl TestServerBuilder {
    /// Spawn a mock and use its models as upstream endpoints, in order.
    pub async fn spawn_gemini(&mut self, mock: GeminiMock) -> TestGemini {
        let gemini = mock.spawn().await;
        self.endpoints.extend(gemini.endpoints());
        gemini
    }

    /// Replace the upstream endpoints with the given models of `gemini`, in order.
    pub fn endpoints(&mut self, gemini: &TestGemini, models: &[&str]) -> &mut Self {
        self.endpoints = models.iter().map(|model| gemini.endpoint(model)).collect();
        self
    }

    /// Do not configure [`TEST_API_KEY`].
    pub fn without_api_key(&mut self) -> &mut Self {
        self.without_api_key = true;
        self
    }

    /// Start the server. The upstream endpoints and the API key are only filled in
    /// when `config_toml` does not set them.
    pub async fn build(&self, config_toml: &str) -> TestServer {
        let mut table: toml::Table = toml::from_str(config_toml).unwrap();

        let upstream = table
            .entry("upstream")
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .unwrap();

        if !self.endpoints.is_empty() && !upstream.contains_key("endpoints") {
            let endpoints = self.endpoints.iter().cloned().map(toml::Value::String).collect();
            upstream.insert("endpoints".to_string(), toml::Value::Array(endpoints));
        }

        if !self.without_api_key && !upstream.contains_key("api_key") {
            upstream.insert("api_key".to_string(), toml::Value::String(TEST_API_KEY.to_string()));
        }

        let config: Config = toml::Value::Table(table).try_into().unwrap();

        TestServer::start_with_config(config).await
    }
}
