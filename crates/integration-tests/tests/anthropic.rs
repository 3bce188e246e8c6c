mod harness;

use harness::config::ConfigBuilder;
use harness::mock_upstream::MockUpstream;
use harness::server::TestServer;
use serde_json::{Value, json};

async fn setup() -> (MockUpstream, TestServer) {
    let mock = MockUpstream::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_mock(&mock).build())
        .await
        .unwrap();
    (mock, server)
}

#[tokio::test]
async fn messages_returns_upstream_text() {
    let (mock, server) = setup().await;

    let resp = server
        .post(
            "/v1/messages",
            &json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 256,
                "system": "Be brief.",
                "messages": [{"role": "user", "content": "Hello"}]
            }),
        )
        .await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-stream-downgraded"], "false");

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["type"], "message");
    assert_eq!(json["id"], "msg_mock");
    assert_eq!(json["role"], "assistant");
    assert_eq!(json["content"][0]["type"], "text");
    assert_eq!(json["content"][0]["text"], "Hello from mock Claude");
    assert_eq!(json["stop_reason"], "end_turn");
    assert_eq!(json["usage"]["input_tokens"], 4);
    assert_eq!(json["usage"]["output_tokens"], 6);

    let upstream = mock.last_request();
    assert_eq!(upstream.path, "/v1/messages");
    assert_eq!(upstream.header("x-api-key"), Some("test-key"));
    assert_eq!(upstream.header("anthropic-version"), Some("2023-06-01"));
    assert_eq!(upstream.body["system"], "Be brief.");
    assert_eq!(upstream.body["max_tokens"], 256);
}

#[tokio::test]
async fn tool_use_reply_drops_text_block() {
    let (mock, server) = setup().await;
    mock.reply_with(
        200,
        json!({
            "id": "msg_tools",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "ok"},
                {"type": "tool_use", "id": "toolu_x1", "name": "f", "input": {"q": "hi"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 12}
        }),
    );

    let resp = server
        .post(
            "/v1/messages",
            &json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 256,
                "messages": [{"role": "user", "content": "call f"}],
                "tools": [{"name": "f", "input_schema": {"type": "object"}}]
            }),
        )
        .await;

    assert_eq!(resp.status(), 200);
    let json: Value = resp.json().await.unwrap();

    assert_eq!(json["stop_reason"], "tool_use");
    assert_eq!(json["content"].as_array().unwrap().len(), 1);
    assert_eq!(json["content"][0]["type"], "tool_use");
    assert_eq!(json["content"][0]["id"], "toolu_x1");
    assert_eq!(json["content"][0]["name"], "f");
    assert_eq!(json["content"][0]["input"], json!({"q": "hi"}));

    let upstream = mock.last_request();
    assert_eq!(upstream.body["tools"][0]["name"], "f");
}

#[tokio::test]
async fn anthropic_history_reaches_openai_upstream() {
    let (mock, server) = setup().await;

    let resp = server
        .post(
            "/v1/messages",
            &json!({
                "model": "gpt-4o",
                "max_tokens": 128,
                "messages": [
                    {"role": "user", "content": "weather?"},
                    {"role": "assistant", "content": [
                        {"type": "tool_use", "id": "toolu_x1", "name": "weather", "input": {"city": "Oslo"}}
                    ]},
                    {"role": "user", "content": [
                        {"type": "tool_result", "tool_use_id": "toolu_x1", "content": "3C"}
                    ]}
                ],
                "tools": [{"name": "weather", "input_schema": {"type": "object"}}]
            }),
        )
        .await;

    assert_eq!(resp.status(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["content"][0]["text"], "Hello from mock upstream");
    assert_eq!(json["id"], "msg_mock");

    let upstream = mock.last_request();
    assert_eq!(upstream.path, "/v1/chat/completions");
    let messages = &upstream.body["messages"];
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["tool_calls"][0]["id"], "call_x1");
    assert_eq!(messages[1]["tool_calls"][0]["function"]["name"], "weather");
    assert_eq!(messages[1]["tool_calls"][0]["function"]["arguments"], "{\"city\":\"Oslo\"}");
    assert_eq!(messages[2]["role"], "tool");
    assert_eq!(messages[2]["tool_call_id"], "call_x1");
    assert_eq!(messages[2]["content"], "3C");
}

#[tokio::test]
async fn gemini_function_call_becomes_tool_use() {
    let (mock, server) = setup().await;
    mock.reply_with(
        200,
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"functionCall": {"name": "lookup", "args": {"id": 5}}}]},
                "finishReason": "STOP"
            }]
        }),
    );

    let resp = server
        .post(
            "/v1/messages",
            &json!({
                "model": "gemini-2.0-flash",
                "max_tokens": 64,
                "messages": [{"role": "user", "content": "find 5"}],
                "tools": [{"name": "lookup", "input_schema": {"type": "object", "properties": {"id": {"type": "integer"}}}}]
            }),
        )
        .await;

    assert_eq!(resp.status(), 200);
    let json: Value = resp.json().await.unwrap();

    assert_eq!(json["stop_reason"], "tool_use");
    assert_eq!(json["content"][0]["type"], "tool_use");
    assert_eq!(json["content"][0]["name"], "lookup");
    assert_eq!(json["content"][0]["input"], json!({"id": 5}));
    assert!(json["content"][0]["id"].as_str().unwrap().starts_with("toolu_"));

    let upstream = mock.last_request();
    assert_eq!(upstream.path, "/v1beta/models/gemini-2.0-flash:generateContent");
    assert_eq!(upstream.header("x-goog-api-key"), Some("test-key"));
    assert_eq!(upstream.body["tools"][0]["functionDeclarations"][0]["name"], "lookup");
}

#[tokio::test]
async fn malformed_body_gets_anthropic_error_envelope() {
    let (_mock, server) = setup().await;

    let resp = server
        .post("/v1/messages", &json!({"model": "claude-sonnet-4-20250514"}))
        .await;

    assert_eq!(resp.status(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["error"]["type"], "invalid_request_error");
}
