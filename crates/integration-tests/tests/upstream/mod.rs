use std::time::Duration;

use indoc::{formatdoc, indoc};
use integration_tests::{GeminiMock, MockReply, TestServer};
use tokio::net::TcpListener;

const FLASH: &str = "gemini-1.5-flash";
const PRO: &str = "gemini-pro";

#[tokio::test]
async fn rate_limited_attempts_back_off_linearly() {
    let config = indoc! {r#"
        [upstream]
        max_retries = 3
        retry_delay = "100ms"
    "#};

    let mut builder = TestServer::builder();
    let mock = GeminiMock::new().reply_times(FLASH, MockReply::rate_limited(), 2);
    let gemini = builder.spawn_gemini(mock).await;
    let server = builder.build(config).await;

    let response = server.client.transform("Monday again.").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), Some("Bright side: Monday again."));

    let requests = gemini.requests();
    assert_eq!(gemini.requested_models(), vec![FLASH, FLASH, FLASH]);

    let first_gap = requests[1].received_at - requests[0].received_at;
    let second_gap = requests[2].received_at - requests[1].received_at;

    assert!(first_gap >= Duration::from_millis(100), "first gap was {first_gap:?}");
    assert!(second_gap >= Duration::from_millis(200), "second gap was {second_gap:?}");
}

#[tokio::test]
async fn exhausted_retries_are_rate_limited() {
    let config = indoc! {r#"
        [upstream]
        max_retries = 2
        retry_delay = "10ms"
    "#};

    let mut builder = TestServer::builder();
    let mock = GeminiMock::new().reply_times(FLASH, MockReply::rate_limited(), 10);
    let gemini = builder.spawn_gemini(mock).await;
    let server = builder.build(config).await;

    let response = server.client.transform("Monday again.").await;

    assert_eq!(response.status, 429);
    insta::assert_json_snapshot!(response.body, @r#"
    {
      "code": "rate_limited",
      "error": "Too many requests. Please wait a moment and try again."
    }
    "#);

    // Rate limiting never moves on to another endpoint.
    assert_eq!(gemini.requested_models(), vec![FLASH, FLASH, FLASH]);
}

#[tokio::test]
async fn zero_retries_fail_on_the_first_rate_limit() {
    let config = indoc! {r#"
        [upstream]
        max_retries = 0
    "#};

    let mut builder = TestServer::builder();
    let mock = GeminiMock::new().reply(FLASH, MockReply::rate_limited());
    let gemini = builder.spawn_gemini(mock).await;
    let server = builder.build(config).await;

    let response = server.client.transform("Monday again.").await;

    assert_eq!(response.code(), Some("rate_limited"));
    assert_eq!(gemini.requests().len(), 1);
}

#[tokio::test]
async fn missing_model_falls_back_and_sticks() {
    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::with_models(&[PRO])).await;
    let server = builder.endpoints(&gemini, &[FLASH, PRO]).build("").await;

    let response = server.client.transform("The train is late.").await;
    assert_eq!(response.text(), Some("Bright side: The train is late."));
    assert_eq!(gemini.requested_models(), vec![FLASH, PRO]);

    let response = server.client.transform("The train is late again.").await;
    assert_eq!(response.status, 200);
    assert_eq!(gemini.requested_models(), vec![FLASH, PRO, PRO]);
}

#[tokio::test]
async fn fallback_wraps_around_from_the_sticky_endpoint() {
    let third = "gemini-1.5-pro";
    let not_found = MockReply::Status(404, r#"{"error":{"code":404,"status":"NOT_FOUND"}}"#.to_string());

    let mock = GeminiMock::with_models(&[FLASH, third])
        .reply(FLASH, not_found.clone())
        .reply(third, MockReply::Generated("Fine.".to_string()))
        .reply(third, not_found);

    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(mock).await;
    let server = builder.endpoints(&gemini, &[FLASH, PRO, third]).build("").await;

    let response = server.client.transform("First").await;
    assert_eq!(response.text(), Some("Fine."));
    assert_eq!(gemini.requested_models(), vec![FLASH, PRO, third]);

    // The third endpoint is now the starting point, and its 404 wraps around to the first.
    let response = server.client.transform("Second").await;
    assert_eq!(response.text(), Some("Bright side: Second"));
    assert_eq!(gemini.requested_models(), vec![FLASH, PRO, third, third, FLASH]);

    let response = server.client.transform("Third").await;
    assert_eq!(response.status, 200);
    assert_eq!(gemini.requested_models(), vec![FLASH, PRO, third, third, FLASH, FLASH]);
}

#[tokio::test]
async fn every_endpoint_missing() {
    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new()).await;
    let server = builder.endpoints(&gemini, &["gone-1", "gone-2"]).build("").await;

    let response = server.client.transform("Hello").await;

    assert_eq!(response.status, 502);
    insta::assert_json_snapshot!(response.body, @r#"
    {
      "code": "endpoint_not_found",
      "error": "The text service is currently unavailable. Please try again later."
    }
    "#);

    assert_eq!(gemini.requested_models(), vec!["gone-1", "gone-2"]);
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let config = indoc! {r#"
        [upstream]
        timeout = "300ms"
    "#};

    let mut builder = TestServer::builder();
    let gemini = builder.spawn_gemini(GeminiMock::new().reply(FLASH, MockReply::Hang)).await;
    let server = builder.build(config).await;

    let started = std::time::Instant::now();
    let response = server.client.transform("Hello").await;

    assert_eq!(response.status, 504);
    assert_eq!(response.code(), Some("timeout"));
    assert!(started.elapsed() < Duration::from_secs(5));

    // A timeout is not retried.
    assert_eq!(gemini.requests().len(), 1);

    // The abandoned upstream call closes its connection, which drops the mock handler.
    let mut waited = 0;

    while gemini.abandoned_requests() == 0 && waited < 40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += 1;
    }

    assert_eq!(gemini.abandoned_requests(), 1);
}

#[tokio::test]
async fn malformed_success_is_an_invalid_response() {
    let mut builder = TestServer::builder();

    let mock = GeminiMock::new()
        .reply(FLASH, MockReply::Status(200, "<html>oops</html>".to_string()))
        .reply(FLASH, MockReply::Status(200, r#"{"candidates":[]}"#.to_string()))
        .reply(
            FLASH,
            MockReply::Status(200, r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#.to_string()),
        );

    let gemini = builder.spawn_gemini(mock).await;
    let server = builder.build("").await;

    for _ in 0..3 {
        let response = server.client.transform("Hello").await;

        assert_eq!(response.status, 500);
        assert_eq!(response.code(), Some("invalid_response"));
    }

    assert_eq!(gemini.requests().len(), 3);
}

#[tokio::test]
async fn upstream_failure_details_stay_on_the_server() {
    let mut builder = TestServer::builder();

    let reply = MockReply::Status(503, "backend overloaded at node-17".to_string());
    let gemini = builder.spawn_gemini(GeminiMock::new().reply(FLASH, reply)).await;
    let server = builder.build("").await;

    let response = server.client.transform("Hello").await;

    assert_eq!(response.status, 500);
    insta::assert_json_snapshot!(response.body, @r#"
    {
      "code": "upstream_error",
      "error": "The text service returned an error. Please try again later."
    }
    "#);

    assert!(!response.body.to_string().contains("node-17"));
    assert_eq!(gemini.requests().len(), 1);
}

#[tokio::test]
async fn rejected_key_is_a_misconfiguration() {
    let mut builder = TestServer::builder();

    let mock = GeminiMock::new()
        .reply(FLASH, MockReply::invalid_api_key())
        .reply(FLASH, MockReply::Status(403, "{}".to_string()));

    let gemini = builder.spawn_gemini(mock).await;
    let server = builder.build("").await;

    for _ in 0..2 {
        let response = server.client.transform("Hello").await;

        assert_eq!(response.status, 500);
        assert_eq!(response.code(), Some("server_misconfigured"));
    }

    assert_eq!(gemini.requested_models(), vec![FLASH, FLASH]);
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let config = formatdoc! {r#"
        [upstream]
        endpoints = ["http://{address}/v1beta/models/gemini-1.5-flash:generateContent"]
    "#};

    let server = TestServer::builder().build(&config).await;
    let response = server.client.transform("Hello").await;

    assert_eq!(response.status, 502);
    insta::assert_json_snapshot!(response.body, @r#"
    {
      "code": "network_error",
      "error": "Could not reach the text service. Please try again later."
    }
    "#);
}
