use indoc::indoc;
use integration_tests::TestServer;
use reqwest::Method;

async fn preflight(server: &TestServer, origin: &str) -> reqwest::Response {
    server
        .client
        .request(Method::OPTIONS, "/api/transform")
        .header("Origin", origin)
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap()
}

fn allowed_origin(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get("access-control-allow-origin")
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn any_origin_by_default() {
    let server = TestServer::builder().build("").await;

    let response = preflight(&server, "https://example.com").await;

    assert_eq!(response.status(), 200);
    assert_eq!(allowed_origin(&response), Some("*"));
    assert!(response.headers().contains_key("access-control-allow-methods"));

    let response = server
        .client
        .request(Method::GET, "/api/status")
        .header("Origin", "https://anywhere.example")
        .send()
        .await
        .unwrap();

    assert_eq!(allowed_origin(&response), Some("*"));
}

#[tokio::test]
async fn explicit_origins() {
    let config = indoc! {r#"
        [server.cors]
        allow_origins = ["https://uplift.example.com/"]
        max_age = "1h"
    "#};

    let server = TestServer::builder().build(config).await;

    let response = preflight(&server, "https://uplift.example.com").await;

    assert_eq!(response.status(), 200);
    assert_eq!(allowed_origin(&response), Some("https://uplift.example.com"));

    let max_age = response.headers().get("access-control-max-age").unwrap();
    assert_eq!(max_age, "3600");

    let methods = response.headers().get("access-control-allow-methods").unwrap();
    assert!(methods.to_str().unwrap().contains("POST"));

    let response = preflight(&server, "https://evil.example.com").await;
    assert_eq!(allowed_origin(&response), None);
}

#[tokio::test]
async fn glob_origins() {
    let config = indoc! {r#"
        [server.cors]
        allow_origins = ["https://*.pages.dev", "http://localhost:5173"]
    "#};

    let server = TestServer::builder().build(config).await;

    let response = preflight(&server, "https://preview-42.pages.dev").await;
    assert_eq!(allowed_origin(&response), Some("https://preview-42.pages.dev"));

    let response = preflight(&server, "http://localhost:5173").await;
    assert_eq!(allowed_origin(&response), Some("http://localhost:5173"));

    let response = preflight(&server, "https://pages.dev.attacker.example").await;
    assert_eq!(allowed_origin(&response), None);
}

#[tokio::test]
async fn credentials() {
    let config = indoc! {r#"
        [server.cors]
        allow_credentials = true
        allow_origins = ["https://uplift.example.com"]
    "#};

    let server = TestServer::builder().build(config).await;
    let response = preflight(&server, "https://uplift.example.com").await;

    let credentials = response.headers().get("access-control-allow-credentials").unwrap();
    assert_eq!(credentials, "true");
}
