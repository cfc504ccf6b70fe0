use std::time::Duration;

use futures::future::join_all;
use indoc::indoc;
use integration_tests::{GeminiMock, TestServer};

#[tokio::test]
async fn eleventh_request_in_a_minute_is_rejected() {
    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build("").await;

    for i in 0..10 {
        let response = server.client.transform(&format!("Request {i}")).await;
        assert_eq!(response.status, 200, "request {i} should pass");
    }

    let response = server.client.transform("One too many").await;

    assert_eq!(response.status, 429);
    insta::assert_json_snapshot!(response.body, @r#"
    {
      "code": "rate_limited",
      "error": "Too many requests. Please wait a moment and try again."
    }
    "#);

    assert_eq!(gemini.requests().len(), 10);
}

#[tokio::test]
async fn invalid_requests_count_against_the_limit() {
    let config = indoc! {r#"
        [server.rate_limits]
        max_requests = 2
    "#};

    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build(config).await;

    assert_eq!(server.client.transform("").await.code(), Some("empty_input"));
    assert_eq!(server.client.transform("   ").await.code(), Some("empty_input"));

    // The limit is checked before the text is validated.
    assert_eq!(server.client.transform("").await.code(), Some("rate_limited"));
    assert_eq!(server.client.transform("Valid text").await.code(), Some("rate_limited"));

    assert!(gemini.requests().is_empty());
}

#[tokio::test]
async fn forwarded_clients_have_independent_windows() {
    let config = indoc! {r#"
        [server.rate_limits]
        max_requests = 2
    "#};

    let mut builder = TestServer::builder();
    builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build(config).await;

    let client = &server.client;

    for _ in 0..2 {
        let response = client.transform_with_header("Hi", "x-forwarded-for", "203.0.113.7").await;
        assert_eq!(response.status, 200);
    }

    // Only the first address of the chain identifies the client.
    let response = client
        .transform_with_header("Hi", "x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .await;

    assert_eq!(response.status, 429);

    let response = client.transform_with_header("Hi", "x-forwarded-for", "198.51.100.2").await;
    assert_eq!(response.status, 200);

    // Neither of them used the bucket of the peer address.
    let response = client.transform("Hi").await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn header_order_decides_the_identity() {
    let config = indoc! {r#"
        [server.rate_limits]
        max_requests = 1

        [server.client_identity]
        trusted_headers = ["x-app-token"]
    "#};

    let mut builder = TestServer::builder();
    builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build(config).await;

    let client = &server.client;

    assert_eq!(client.transform_with_header("Hi", "x-app-token", "alpha").await.status, 200);
    assert_eq!(client.transform_with_header("Hi", "x-app-token", "alpha").await.status, 429);
    assert_eq!(client.transform_with_header("Hi", "x-app-token", "beta").await.status, 200);

    // An untrusted header falls back to the peer address, shared by both requests.
    assert_eq!(client.transform_with_header("Hi", "x-forwarded-for", "192.0.2.1").await.status, 200);
    assert_eq!(client.transform_with_header("Hi", "x-forwarded-for", "192.0.2.2").await.status, 429);
}

#[tokio::test]
async fn window_slides() {
    let config = indoc! {r#"
        [server.rate_limits]
        max_requests = 2
        window = "1s"
    "#};

    let mut builder = TestServer::builder();
    builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build(config).await;

    assert_eq!(server.client.transform("Hi").await.status, 200);
    assert_eq!(server.client.transform("Hi").await.status, 200);
    assert_eq!(server.client.transform("Hi").await.status, 429);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(server.client.transform("Hi").await.status, 200);
}

#[tokio::test]
async fn disabled_rate_limit_admits_everything() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = false
    "#};

    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build(config).await;

    for _ in 0..15 {
        assert_eq!(server.client.transform("Hi").await.status, 200);
    }

    assert_eq!(gemini.requests().len(), 15);
}

#[tokio::test]
async fn concurrent_requests_never_exceed_the_limit() {
    let config = indoc! {r#"
        [server.rate_limits]
        max_requests = 5
    "#};

    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.build(config).await;

    let responses = join_all((0..25).map(|i| {
        let text = format!("Concurrent {i}");
        let client = &server.client;
        async move { client.transform(&text).await }
    }))
    .await;

    let admitted = responses.iter().filter(|response| response.status == 200).count();
    let rejected = responses.iter().filter(|response| response.status == 429).count();

    assert_eq!(admitted, 5);
    assert_eq!(rejected, 20);
    assert_eq!(gemini.requests().len(), 5);
}

#[tokio::test]
async fn health_check_is_not_rate_limited() {
    let config = indoc! {r#"
        [server.rate_limits]
        max_requests = 1
    "#};

    let server = TestServer::builder().build(config).await;

    for _ in 0..5 {
        assert_eq!(server.client.get("/health").await.status(), 200);
    }
}
