use indoc::indoc;
use integration_tests::{MockUpstream, TestServer};
use serde_json::json;

const COMPLETION: &str = r#"{"id":"c3","object":"chat.completion","choices":[]}"#;

#[tokio::test]
async fn path_query_and_body_reach_upstream() {
    let upstream = MockUpstream::json(COMPLETION).spawn().await.unwrap();
    let server = TestServer::in_front_of(&upstream, "").await;

    let request = json!({ "model": "qwen3-0.6b", "messages": [] });
    server.client.post("/v1/chat/completions?api-version=2024-10-21", &request).await;

    let received = upstream.received().pop().unwrap();

    assert_eq!(received.method, "POST");
    assert_eq!(received.path_and_query, "/v1/chat/completions?api-version=2024-10-21");
    assert_eq!(received.headers["content-type"], "application/json");
    assert_eq!(received.body, request.to_string());
}

#[tokio::test]
async fn upstream_base_path_is_kept() {
    let upstream = MockUpstream::json(COMPLETION).spawn().await.unwrap();

    let config = format!("[upstream]\nurl = \"{}/openai\"\n", upstream.url());
    let server = TestServer::start(&config).await;

    server.client.get("/v1/models").await;

    assert_eq!(upstream.received().pop().unwrap().path_and_query, "/openai/v1/models");
}

#[tokio::test]
async fn real_ip_is_forwarded_for_instrumented_requests() {
    let upstream = MockUpstream::json(COMPLETION).spawn().await.unwrap();

    let config = indoc! {r#"
        [token_usage]
        realIPToHeader = "X-Real-IP"
    "#};

    let server = TestServer::in_front_of(&upstream, config).await;

    server.client.post("/v1/chat/completions", &json!({})).await;
    let instrumented = upstream.received().pop().unwrap();
    assert_eq!(instrumented.headers["x-real-ip"], "127.0.0.1");

    server.client.get("/v1/models").await;
    let passed_through = upstream.received().pop().unwrap();
    assert_eq!(passed_through.headers.get("x-real-ip"), None);
}

#[tokio::test]
async fn real_ip_is_not_written_by_default() {
    let upstream = MockUpstream::json(COMPLETION).spawn().await.unwrap();
    let server = TestServer::in_front_of(&upstream, "").await;

    server.client.post("/v1/chat/completions", &json!({})).await;

    assert_eq!(upstream.received().pop().unwrap().headers.get("x-real-ip"), None);
}

#[tokio::test]
async fn upstream_status_is_forwarded() {
    let upstream = MockUpstream::json(r#"{"error":{"message":"model not found"}}"#)
        .with_status(axum::http::StatusCode::NOT_FOUND)
        .spawn()
        .await
        .unwrap();

    let server = TestServer::in_front_of(&upstream, "").await;
    let response = server.client.post("/v1/chat/completions", &json!({})).await;

    assert_eq!(response.status(), 404);
    insta::assert_snapshot!(response.text().await.unwrap(), @r#"{"error":{"message":"model not found"}}"#);
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    // Nothing listens on the discard port.
    let config = indoc! {r#"
        [upstream]
        url = "http://127.0.0.1:9"
    "#};

    let server = TestServer::start(config).await;
    let response = server.client.post("/v1/chat/completions", &json!({})).await;

    assert_eq!(response.status(), 502);
    insta::assert_snapshot!(response.text().await.unwrap(), @"Bad gateway");
}
