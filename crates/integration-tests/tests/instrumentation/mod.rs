use std::time::Duration;

use indoc::indoc;
use integration_tests::{MockUpstream, TestServer};
use serde_json::{Value, json};

const CHAT_CHUNKS: [&str; 4] = [
    "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"}}]}\n\n",
    "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"}}]}\n\n",
    "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":20,\"total_tokens\":32}}\n\n",
    "data: [DONE]\n\n",
];

fn chat_request() -> Value {
    json!({
        "model": "qwen3-0.6b",
        "stream": true,
        "stream_options": { "include_usage": true },
        "messages": [{ "role": "user", "content": "Hi" }]
    })
}

#[tokio::test]
async fn chat_completion_stream_gets_metrics() {
    let upstream = MockUpstream::streaming(CHAT_CHUNKS)
        .with_chunk_delay(Duration::from_millis(50))
        .spawn()
        .await
        .unwrap();

    let server = TestServer::in_front_of(&upstream, "").await;
    let events = server.client.post_events("/v1/chat/completions", &chat_request()).await;

    assert_eq!(events.len(), 4);

    insta::assert_snapshot!(events[0], @r#"{"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hello"}}]}"#);
    insta::assert_snapshot!(events[1], @r#"{"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":" world"}}]}"#);
    insta::assert_snapshot!(events[3], @"[DONE]");

    // Existing bytes are kept, the metrics are appended to the usage object.
    assert!(
        events[2].starts_with(r#"{"id":"c1","object":"chat.completion.chunk","choices":[],"usage":{"prompt_tokens":12,"completion_tokens":20,"total_tokens":32,"time_to_first_token_ms":"#),
        "{}",
        events[2]
    );

    let chunk: Value = serde_json::from_str(&events[2]).unwrap();
    let usage = &chunk["usage"];

    let time_to_first_token = usage["time_to_first_token_ms"].as_i64().unwrap();
    let time_per_output_token = usage["time_per_output_token_ms"].as_i64().unwrap();
    let tokens_per_second = usage["tokens_per_second"].as_f64().unwrap();

    assert!(usage["tokens_per_second"].is_f64());
    assert!(time_to_first_token >= 50, "{time_to_first_token}");

    // Two more delayed chunks arrive after the first one, 20 tokens over roughly 100 ms.
    assert!(time_per_output_token >= 4, "{time_per_output_token}");
    assert!(tokens_per_second > 0.0 && tokens_per_second < 400.0, "{tokens_per_second}");
}

#[tokio::test]
async fn chunks_without_usage_are_byte_identical() {
    let chunks = [
        "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n\r\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}],\"usage\":null}\n\n",
    ];

    let upstream = MockUpstream::streaming(chunks)
        .with_chunk_delay(Duration::from_millis(20))
        .spawn()
        .await
        .unwrap();

    let server = TestServer::in_front_of(&upstream, "").await;
    let response = server.client.post("/v1/chat/completions", &chat_request()).await;

    assert_eq!(response.text().await.unwrap(), chunks.concat());
}

#[tokio::test]
async fn anthropic_message_delta_keeps_event_line() {
    let chunks = [
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":15}}\n\n",
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    ];

    let upstream = MockUpstream::streaming(chunks)
        .with_chunk_delay(Duration::from_millis(20))
        .spawn()
        .await
        .unwrap();

    let config = indoc! {r#"
        [token_usage]
        enableOnPathSuffix = ["/v1/messages"]
    "#};

    let server = TestServer::in_front_of(&upstream, config).await;
    let response = server.client.post("/v1/messages", &json!({ "stream": true })).await;
    let body = response.text().await.unwrap();

    let records: Vec<&str> = body.split("\n\n").collect();

    assert_eq!(records.len(), 4);
    assert_eq!(records[0], chunks[0].trim_end());
    assert_eq!(records[2], chunks[2].trim_end());
    assert_eq!(records[3], "");

    assert!(
        records[1].starts_with("event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":15,\"time_to_first_token_ms\":"),
        "{}",
        records[1]
    );
}

#[tokio::test]
async fn non_streaming_completion_stays_plain_json() {
    let upstream = MockUpstream::json(
        r#"{"id":"c2","object":"chat.completion","choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7,"total_tokens":12}}"#,
    )
    .spawn()
    .await
    .unwrap();

    let server = TestServer::in_front_of(&upstream, "").await;
    let response = server.client.post("/v1/chat/completions", &json!({ "stream": false })).await;

    assert_eq!(response.headers()["content-type"], "application/json");

    let body: Value = response.json().await.unwrap();
    let usage = body["usage"].as_object().unwrap();

    let mut keys: Vec<_> = usage.keys().collect();
    keys.sort();

    insta::assert_debug_snapshot!(keys, @r#"
    [
        "completion_tokens",
        "prompt_tokens",
        "time_per_output_token_ms",
        "time_to_first_token_ms",
        "tokens_per_second",
        "total_tokens",
    ]
    "#);

    // The whole body arrives in one frame, so no generation time is measured.
    assert_eq!(usage["time_per_output_token_ms"], 0);
    assert_eq!(usage["tokens_per_second"], 0.0);
}

#[tokio::test]
async fn embeddings_without_output_tokens_are_untouched() {
    let embeddings = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],"usage":{"prompt_tokens":8,"total_tokens":8}}"#;
    let upstream = MockUpstream::json(embeddings).spawn().await.unwrap();

    let server = TestServer::in_front_of(&upstream, "").await;
    let response = server.client.post("/v1/embeddings", &json!({ "input": "hello" })).await;

    assert_eq!(response.text().await.unwrap(), embeddings);
}

#[tokio::test]
async fn out_of_scope_paths_are_untouched() {
    let upstream = MockUpstream::streaming(CHAT_CHUNKS).spawn().await.unwrap();

    let server = TestServer::in_front_of(&upstream, "").await;
    let response = server.client.post("/v1/assistants", &chat_request()).await;

    assert_eq!(response.text().await.unwrap(), CHAT_CHUNKS.concat());
}

#[tokio::test]
async fn configured_suffix_is_instrumented() {
    let upstream = MockUpstream::streaming(CHAT_CHUNKS).spawn().await.unwrap();

    let config = indoc! {r#"
        [token_usage]
        enableOnPathSuffix = ["/v1/assistants"]
    "#};

    let server = TestServer::in_front_of(&upstream, config).await;
    let events = server.client.post_events("/v1/assistants", &chat_request()).await;

    assert!(events[2].contains("\"tokens_per_second\":"), "{}", events[2]);
}
