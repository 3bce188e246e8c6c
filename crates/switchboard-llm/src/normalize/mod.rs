//! Backend normalizers
//!
//! One pure function per [`BackendKind`], each turning an upstream's native
//! payload into a canonical response. The invariant that tool calls imply
//! empty content and a `ToolCalls` finish reason is applied here for every
//! kind, before repair runs.

mod blocks;
pub mod extract;
mod generic;
mod passthrough;
mod text_calls;

use serde_json::{Map, Value};
use switchboard_config::BackendKind;
use thiserror::Error;

use crate::bridge::ids;
use crate::types::{CanonicalMessage, CanonicalResponse, FinishReason, ToolArguments, ToolCall, ToolDefinition, Usage};

pub use text_calls::extract_calls;

/// Keys a tool call's arguments may arrive under
const ARGUMENT_KEYS: &[&str] = &["arguments", "parameters", "input", "args"];

/// Message returned to clients when a payload cannot be translated
pub const TRANSLATION_FAILED_MESSAGE: &str = "The upstream model returned a response that could not be translated.";

/// Upstream payload shape entirely unrecognized by its normalizer
#[derive(Debug, Error)]
#[error("{backend:?} payload not recognized: {reason}")]
pub struct TranslationError {
    pub backend: BackendKind,
    pub reason: &'static str,
}

impl TranslationError {
    const fn new(backend: BackendKind, reason: &'static str) -> Self {
        Self { backend, reason }
    }
}

/// Normalizer output before response-level fields are filled in
#[derive(Debug)]
struct Normalized {
    id: Option<String>,
    message: CanonicalMessage,
    finish_reason: FinishReason,
}

impl Normalized {
    fn new(id: Option<String>, content: String, tool_calls: Vec<ToolCall>, finish_reason: FinishReason) -> Self {
        let mut message = CanonicalMessage::assistant(content);
        message.tool_calls = tool_calls;

        Self {
            id,
            message,
            finish_reason,
        }
    }
}

/// Convert a raw upstream payload into a canonical response
///
/// Usage is left zeroed; the caller fills it in from the payload or an estimate.
///
/// # Errors
///
/// Returns [`TranslationError`] when the payload shape is not recognized
pub fn normalize(
    backend: BackendKind,
    raw: &Value,
    tools: &[ToolDefinition],
    model: &str,
) -> Result<CanonicalResponse, TranslationError> {
    let Normalized {
        id,
        mut message,
        mut finish_reason,
    } = match backend {
        BackendKind::NativePassthrough => passthrough::normalize(raw)?,
        BackendKind::BlockContent => blocks::normalize(raw)?,
        BackendKind::FunctionCallInText => text_calls::normalize(raw, tools)?,
        BackendKind::Generic => generic::normalize(raw)?,
    };

    if message.has_tool_calls() {
        message.content.clear();
        finish_reason = FinishReason::ToolCalls;
    }

    Ok(CanonicalResponse {
        id: id.map_or_else(ids::new_response_id, |id| ids::response_to_canonical(&id)),
        model: model.to_owned(),
        message,
        finish_reason,
        usage: Usage::default(),
    })
}

/// Well-formed response carrying an error finish reason and a client-safe message
pub fn error_response(model: &str) -> CanonicalResponse {
    failure_response(model, TRANSLATION_FAILED_MESSAGE)
}

/// Error-finished response whose content is `message`
pub fn failure_response(model: &str, message: impl Into<String>) -> CanonicalResponse {
    CanonicalResponse {
        id: ids::new_response_id(),
        model: model.to_owned(),
        message: CanonicalMessage::assistant(message),
        finish_reason: FinishReason::Error,
        usage: Usage::default(),
    }
}

/// Build a tool call from a loosely shaped JSON object
///
/// Accepts the `OpenAI` shape (`function.name`, `function.arguments`), the
/// Anthropic shape (`name`, `input`) and prompted variants (`parameters`,
/// `args`). Unused keys are kept in `extra` for repair to consult.
fn tool_call_from_value(value: &Value) -> Option<ToolCall> {
    let object = value.as_object()?;
    let mut fields: Map<String, Value> = object.clone();

    if let Some(Value::Object(function)) = fields.remove("function") {
        for (key, inner) in function {
            fields.entry(key).or_insert(inner);
        }
    }

    let id = match fields.remove("id") {
        Some(Value::String(id)) => ids::tool_from_upstream(&id),
        _ => String::new(),
    };

    let function_name = match fields.remove("name") {
        Some(Value::String(name)) => name.trim().to_owned(),
        Some(other) => {
            fields.insert("name".to_owned(), other);
            String::new()
        }
        None => String::new(),
    };

    let arguments = ARGUMENT_KEYS
        .iter()
        .find_map(|key| fields.remove(*key))
        .map_or_else(ToolArguments::default, |value| match value {
            Value::String(text) => ToolArguments::Encoded(text),
            other => ToolArguments::Value(other),
        });

    fields.remove("type");

    Some(ToolCall {
        id,
        function_name,
        arguments,
        extra: fields,
    })
}

/// Text of an `OpenAI`-style content value: a string or a list of parts
fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::repair;

    #[test]
    fn tool_call_from_openai_shape() {
        let call = tool_call_from_value(&json!({
            "id": "call_abc",
            "type": "function",
            "function": {"name": "lookup", "arguments": "{\"id\":5}"}
        }))
        .unwrap();

        assert_eq!(call.id, "abc");
        assert_eq!(call.function_name, "lookup");
        assert_eq!(call.arguments, ToolArguments::Encoded("{\"id\":5}".to_owned()));
        assert!(call.extra.is_empty());
    }

    #[test]
    fn tool_call_keeps_unknown_name_keys_for_repair() {
        let call = tool_call_from_value(&json!({"tool_name": "search", "args": {"q": 1}})).unwrap();

        assert_eq!(call.function_name, "");
        assert_eq!(call.arguments, ToolArguments::Value(json!({"q": 1})));
        assert_eq!(call.extra.get("tool_name"), Some(&json!("search")));
    }

    #[test]
    fn every_normalizer_output_keeps_content_empty_with_calls() {
        let cases = [
            (
                BackendKind::NativePassthrough,
                json!({"choices": [{"message": {"content": "calling", "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "f", "arguments": "{}"}}
                ]}, "finish_reason": "stop"}]}),
            ),
            (
                BackendKind::BlockContent,
                json!([{"type": "text", "text": "a"}, {"type": "tool_use", "id": "x", "name": "f", "input": {}}]),
            ),
            (
                BackendKind::FunctionCallInText,
                json!({"choices": [{"message": {"content": "ok <tool_call>{\"name\":\"f\",\"arguments\":{}}</tool_call>"}}]}),
            ),
        ];

        for (backend, raw) in cases {
            let response = normalize(backend, &raw, &[], "m").unwrap();
            assert!(response.message.has_tool_calls(), "{backend:?}");
            assert_eq!(response.message.content, "", "{backend:?}");
            assert_eq!(response.finish_reason, FinishReason::ToolCalls, "{backend:?}");

            let (repaired, _) = repair::repair_response(response, &[]);
            assert_eq!(repaired.message.content, "");
        }
    }

    #[test]
    fn native_passthrough_scenario() {
        let raw = json!({
            "id": "chatcmpl-9",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_q", "type": "function", "function": {"name": "lookup", "arguments": "{\"id\":5}"}}
                ]},
                "finish_reason": "tool_calls"
            }]
        });

        let response = normalize(BackendKind::NativePassthrough, &raw, &[], "gpt-4o").unwrap();
        let (response, _) = repair::repair_response(response, &[]);

        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].function_name, "lookup");
        assert_eq!(
            response.message.tool_calls[0].arguments,
            ToolArguments::Encoded("{\"id\":5}".to_owned())
        );
    }

    #[test]
    fn block_content_scenario() {
        let raw = json!([
            {"type": "text", "text": "ok"},
            {"type": "tool_use", "id": "x1", "name": "f", "input": {"q": "hi"}}
        ]);

        let response = normalize(BackendKind::BlockContent, &raw, &[], "claude-x").unwrap();
        let (response, _) = repair::repair_response(response, &[]);

        assert_eq!(response.message.content, "");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        let call = &response.message.tool_calls[0];
        assert_eq!(call.id, "x1");
        assert_eq!(call.function_name, "f");
        assert_eq!(call.arguments, ToolArguments::Encoded("{\"q\":\"hi\"}".to_owned()));
    }

    #[test]
    fn malformed_name_scenario() {
        let raw = json!({"choices": [{"message": {"tool_calls": [
            {"id": "call_1", "type": "function", "function": {"arguments": "{\"q\":\"rust\"}"}}
        ]}}]});
        let tools = [ToolDefinition {
            name: "search".to_owned(),
            description: None,
            parameters: json!({"type": "object"}),
        }];

        let response = normalize(BackendKind::NativePassthrough, &raw, &tools, "gpt-4o").unwrap();
        let (response, repaired) = repair::repair_response(response, &tools);

        assert!(repaired);
        assert_eq!(response.message.tool_calls[0].function_name, "search");
    }

    #[test]
    fn upstream_ids_lose_their_prefix() {
        let raw = json!({"id": "chatcmpl-abc", "choices": [{"message": {"content": "hi"}}]});
        let response = normalize(BackendKind::NativePassthrough, &raw, &[], "gpt-4o").unwrap();
        assert_eq!(response.id, "abc");
    }

    #[test]
    fn unrecognized_payload_is_an_error() {
        let err = normalize(BackendKind::BlockContent, &json!({"weird": true}), &[], "m").unwrap_err();
        assert_eq!(err.backend, BackendKind::BlockContent);
    }
}
