use indoc::indoc;
use integration_tests::{GeminiMock, TEST_API_KEY, TestServer};

const CALLER_KEY: &str = "AIzaCallerOwnKey";

#[tokio::test]
async fn caller_key_is_forwarded() {
    let config = indoc! {r#"
        [upstream]
        forward_key = true
    "#};

    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build(config).await;

    let response = server
        .client
        .transform_with_header("Hello", "X-Gemini-Api-Key", CALLER_KEY)
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(gemini.requests()[0].header_key.as_deref(), Some(CALLER_KEY));
}

#[tokio::test]
async fn configured_key_is_the_fallback() {
    let config = indoc! {r#"
        [upstream]
        forward_key = true
    "#};

    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build(config).await;

    assert_eq!(server.client.transform("Hello").await.status, 200);

    // A blank header counts as absent.
    let response = server.client.transform_with_header("Hello", "X-Gemini-Api-Key", "  ").await;
    assert_eq!(response.status, 200);

    let keys: Vec<_> = gemini.requests().into_iter().map(|request| request.header_key).collect();
    assert_eq!(keys, vec![Some(TEST_API_KEY.to_string()), Some(TEST_API_KEY.to_string())]);
}

#[tokio::test]
async fn caller_key_is_ignored_unless_enabled() {
    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build("").await;

    let response = server
        .client
        .transform_with_header("Hello", "X-Gemini-Api-Key", CALLER_KEY)
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(gemini.requests()[0].header_key.as_deref(), Some(TEST_API_KEY));
}

#[tokio::test]
async fn caller_key_alone_is_enough() {
    let config = indoc! {r#"
        [upstream]
        forward_key = true
    "#};

    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.without_api_key().build(config).await;

    let response = server.client.transform("Hello").await;
    assert_eq!(response.code(), Some("server_misconfigured"));
    assert!(gemini.requests().is_empty());

    let response = server
        .client
        .transform_with_header("Hello", "X-Gemini-Api-Key", CALLER_KEY)
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(gemini.requests()[0].header_key.as_deref(), Some(CALLER_KEY));

    // The status endpoint reports the configured key only.
    let status: serde_json::Value = server.client.get("/api/status").await.json().await.unwrap();
    assert_eq!(status["apiConfigured"], false);
}
