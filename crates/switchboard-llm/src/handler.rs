//! Axum route handlers for OpenAI-compatible and Anthropic-compatible endpoints

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use http::HeaderValue;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use switchboard_core::{ErrorEnvelope, HttpError};

use crate::bridge::unix_now;
use crate::error::LlmError;
use crate::protocol::anthropic::AnthropicRequest;
use crate::protocol::openai::{OpenAiModel, OpenAiModelList, OpenAiRequest};
use crate::state::{ClientRequest, ClientResponse, LlmState};
use crate::types::ClientProtocol;

/// Build the LLM router with all endpoints
pub fn llm_router(state: LlmState) -> Router {
    Router::new()
        // OpenAI-compatible endpoints
        .route("/v1/chat/completions", routing::post(openai_chat_completions))
        .route("/v1/models", routing::get(openai_list_models))
        // Anthropic-compatible endpoint
        .route("/v1/messages", routing::post(anthropic_messages))
        .with_state(state)
}

/// Handle `POST /v1/chat/completions`
async fn openai_chat_completions(
    State(state): State<LlmState>,
    payload: Result<Json<OpenAiRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => respond(&state, ClientRequest::OpenAi(request)).await,
        Err(rejection) => error_to_openai_response(rejected(&rejection)),
    }
}

/// Handle `POST /v1/messages`
async fn anthropic_messages(
    State(state): State<LlmState>,
    payload: Result<Json<AnthropicRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => respond(&state, ClientRequest::Anthropic(request)).await,
        Err(rejection) => error_to_anthropic_response(rejected(&rejection)),
    }
}

/// Handle `GET /v1/models`
async fn openai_list_models(State(state): State<LlmState>) -> Response {
    let created = unix_now();

    let data = state
        .registry()
        .known_models()
        .iter()
        .map(|model| OpenAiModel {
            id: model.clone(),
            object: "model".to_owned(),
            created,
            owned_by: "switchboard".to_owned(),
        })
        .collect();

    Json(OpenAiModelList {
        object: "list".to_owned(),
        data,
    })
    .into_response()
}

async fn respond(state: &LlmState, request: ClientRequest) -> Response {
    let protocol = request.protocol();

    match state.handle(request).await {
        Ok(response) => into_http(response),
        Err(error) => match protocol {
            ClientProtocol::OpenAi => error_to_openai_response(error),
            ClientProtocol::Anthropic => error_to_anthropic_response(error),
        },
    }
}

fn into_http(response: ClientResponse) -> Response {
    let metadata = response.metadata();

    let mut http = match response {
        ClientResponse::Json { body, .. } => Json(body).into_response(),
        ClientResponse::Stream { frames, .. } => {
            let mut http = Body::from_stream(frames).into_response();
            let headers = http.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            http
        }
    };

    metadata.apply(http.headers_mut());
    http
}

fn rejected(rejection: &JsonRejection) -> LlmError {
    LlmError::InvalidRequest(rejection.body_text())
}

/// Convert an LLM error to an `OpenAI`-style JSON error response
#[allow(clippy::needless_pass_by_value)]
fn error_to_openai_response(error: LlmError) -> Response {
    error_response(ErrorEnvelope::OpenAi, &error)
}

/// Convert an LLM error to an Anthropic-style JSON error response
#[allow(clippy::needless_pass_by_value)]
fn error_to_anthropic_response(error: LlmError) -> Response {
    error_response(ErrorEnvelope::Anthropic, &error)
}

fn error_response(envelope: ErrorEnvelope, error: &LlmError) -> Response {
    (error.status_code(), Json(envelope.render(error))).into_response()
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn openai_error_envelope() {
        let response = error_to_openai_response(LlmError::Transport("connection refused".to_owned()));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "api_error");
        assert!(body["error"]["code"].is_null());
        assert!(body["error"]["message"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn anthropic_error_envelope_keeps_upstream_status() {
        let response = error_to_anthropic_response(LlmError::Upstream {
            status: 401,
            body: "bad key".to_owned(),
        });
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "authentication_error");
    }
}
