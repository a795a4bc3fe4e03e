//! Claude provider against a local stand-in for the Messages endpoint

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use mcp_chat::core::{ToolDescriptor, ToolInvocationRequest, ToolInvocationResult, Turn};
use mcp_chat::llm::{ClaudeProvider, LlmError, ModelGateway, ToolContext};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Captured {
    requests: Mutex<Vec<(HeaderMap, Value)>>,
}

struct MockApi {
    status: StatusCode,
    body: Value,
    captured: Captured,
}

async fn messages(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    api.captured.requests.lock().unwrap().push((headers, body));
    (api.status, Json(api.body.clone()))
}

async fn mock_api(status: StatusCode, body: Value) -> (Arc<MockApi>, String) {
    let api = Arc::new(MockApi {
        status,
        body,
        captured: Captured::default(),
    });
    let app = Router::new()
        .route("/v1/messages", post(messages))
        .with_state(api.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    (api, format!("http://{addr}/v1/messages"))
}

fn provider(url: &str) -> ClaudeProvider {
    ClaudeProvider::new("sk-test")
        .with_model("claude-test")
        .with_max_tokens(64)
        .with_api_url(url)
}

#[tokio::test]
async fn test_generate_sends_headers_and_joins_text() {
    let (api, url) = mock_api(
        StatusCode::OK,
        json!({
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "there"}
            ],
            "stop_reason": "end_turn"
        }),
    )
    .await;

    let transcript = vec![Turn::user("hi"), Turn::assistant("hey"), Turn::user("again")];
    let text = provider(&url).generate(&transcript, None).await.unwrap();
    assert_eq!(text, "Hello\nthere");

    let requests = api.captured.requests.lock().unwrap();
    let (headers, body) = &requests[0];
    assert_eq!(headers["x-api-key"], "sk-test");
    assert_eq!(headers["anthropic-version"], "2023-06-01");
    assert_eq!(body["model"], "claude-test");
    assert_eq!(body["max_tokens"], 64);
    assert!(body.get("tools").is_none());
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);
    assert_eq!(body["messages"][2], json!({"role": "user", "content": "again"}));
}

#[tokio::test]
async fn test_tool_context_reaches_request() {
    let (api, url) = mock_api(
        StatusCode::OK,
        json!({"content": [{"type": "text", "text": "The tool failed."}]}),
    )
    .await;

    let request = ToolInvocationRequest::new("ping_pong", json!({"message": "ping"}));
    let result = ToolInvocationResult::failure("boom");
    let context = ToolContext {
        request: &request,
        result: &result,
    };
    let text = provider(&url)
        .generate(&[Turn::user("ping")], Some(context))
        .await
        .unwrap();
    assert_eq!(text, "The tool failed.");

    let requests = api.captured.requests.lock().unwrap();
    let body = &requests[0].1;
    let content = body["messages"][0]["content"].as_str().unwrap();
    assert!(content.starts_with("ping\nTool Call: ping_pong"));
    assert!(content.contains("boom"));
    assert!(body["system"].as_str().unwrap().contains("ping_pong"));
}

#[tokio::test]
async fn test_catalog_request_lists_tools_and_ignores_tool_use() {
    let (api, url) = mock_api(
        StatusCode::OK,
        json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "tu_1", "name": "ping_pong", "input": {"message": "ping"}}
            ],
            "stop_reason": "tool_use"
        }),
    )
    .await;

    let catalog = vec![ToolDescriptor {
        name: "ping_pong".to_string(),
        description: "Reply pong".to_string(),
        input_schema: Value::Null,
        supports_canned_reply: true,
    }];
    let text = provider(&url)
        .generate_with_catalog(&[Turn::user("can you ping?")], &catalog)
        .await
        .unwrap();
    assert_eq!(text, "Let me check.");

    let requests = api.captured.requests.lock().unwrap();
    let tools = requests[0].1["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "ping_pong");
    assert_eq!(tools[0]["description"], "Reply pong");
    assert_eq!(tools[0]["input_schema"]["type"], "object");
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    let (_api, url) = mock_api(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"type": "rate_limit_error"}}),
    )
    .await;
    let err = provider(&url)
        .generate(&[Turn::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RateLimited(_)));
    assert!(err.is_retryable());

    let (_api, url) = mock_api(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;
    let err = provider(&url)
        .generate(&[Turn::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::ServiceError { status: 500, .. }));

    let (_api, url) = mock_api(
        StatusCode::from_u16(529).unwrap(),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    )
    .await;
    let err = provider(&url)
        .generate(&[Turn::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Overloaded(ref m) if m == "overloaded_error: Overloaded"));

    let (_api, url) = mock_api(StatusCode::UNAUTHORIZED, json!({})).await;
    let err = provider(&url)
        .generate(&[Turn::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Unauthorized(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = provider(&format!("http://{addr}/v1/messages"))
        .generate(&[Turn::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Network(_)));
}
