//! Mock upstream provider for integration tests
//!
//! Serves the OpenAI, Anthropic, Gemini and text completion routes with
//! canned replies, records every request, and can be scripted to answer
//! with a fixed status and body or to stall.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Request as received by the mock
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[derive(Default)]
struct MockState {
    scripted: Mutex<Option<(StatusCode, Value)>>,
    delay: Mutex<Duration>,
    requests: Mutex<Vec<Recorded>>,
}

/// Mock upstream that returns predictable responses
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockUpstream {
    /// Start the mock server, returning immediately
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(chat_completions))
            .route("/v1/messages", routing::post(messages))
            .route("/v1/completions", routing::post(completions))
            .route("/v1beta/models/{target}", routing::post(generate_content))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for the OpenAI, Anthropic and text upstreams
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Base URL for the Gemini upstream
    pub fn gemini_base_url(&self) -> String {
        format!("http://{}/v1beta", self.addr)
    }

    /// Answer every following request with `status` and `body`
    pub fn reply_with(&self, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).expect("valid status");
        *self.state.scripted.lock().unwrap() = Some((status, body));
    }

    /// Wait this long before answering
    pub fn stall_for(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// The most recent request
    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("mock received a request")
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MockState {
    async fn respond(&self, uri: &Uri, headers: HeaderMap, body: Value, canned: fn(&Value) -> Value) -> Response {
        self.requests.lock().unwrap().push(Recorded {
            path: uri.path().to_owned(),
            headers,
            body: body.clone(),
        });

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.scripted.lock().unwrap().clone();
        match scripted {
            Some((status, reply)) => (status, Json(reply)).into_response(),
            None => Json(canned(&body)).into_response(),
        }
    }
}

async fn chat_completions(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.respond(&uri, headers, body, chat_completion_reply).await
}

async fn messages(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.respond(&uri, headers, body, message_reply).await
}

async fn completions(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.respond(&uri, headers, body, completion_reply).await
}

async fn generate_content(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.respond(&uri, headers, body, gemini_reply).await
}

// -- Canned replies --

fn chat_completion_reply(request: &Value) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": request["model"],
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello from mock upstream"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8}
    })
}

fn message_reply(request: &Value) -> Value {
    json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "model": request["model"],
        "content": [{"type": "text", "text": "Hello from mock Claude"}],
        "stop_reason": "end_turn",
        "stop_sequence": null,
        "usage": {"input_tokens": 4, "output_tokens": 6}
    })
}

fn completion_reply(_request: &Value) -> Value {
    json!({
        "id": "cmpl-mock",
        "object": "text_completion",
        "choices": [{"index": 0, "text": "Hello from mock text model", "finish_reason": "stop"}]
    })
}

fn gemini_reply(_request: &Value) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Hello from mock Gemini"}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 3, "totalTokenCount": 5}
    })
}

/// OpenAI chat completion whose message content is `text`
pub fn chat_text(text: &str) -> Value {
    json!({
        "id": "chatcmpl-scripted",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
}
