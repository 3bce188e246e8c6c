//! Payloads already in `OpenAI` chat completion shape

use serde_json::Value;
use switchboard_config::BackendKind;

use super::{Normalized, TranslationError, content_text, tool_call_from_value};
use crate::types::FinishReason;

pub(super) fn normalize(raw: &Value) -> Result<Normalized, TranslationError> {
    let choice = raw
        .pointer("/choices/0")
        .ok_or(TranslationError::new(BackendKind::NativePassthrough, "missing choices"))?;

    let message = choice
        .get("message")
        .filter(|message| message.is_object())
        .ok_or(TranslationError::new(BackendKind::NativePassthrough, "choice has no message"))?;

    let content = message.get("content").map(content_text).unwrap_or_default();

    let mut tool_calls: Vec<_> = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| calls.iter().filter_map(tool_call_from_value).collect())
        .unwrap_or_default();

    // Legacy single `function_call`
    if tool_calls.is_empty()
        && let Some(call) = message.get("function_call").and_then(tool_call_from_value)
    {
        tool_calls.push(call);
    }

    let finish_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .map_or(FinishReason::Stop, finish_reason);

    Ok(Normalized::new(
        raw.get("id").and_then(Value::as_str).map(str::to_owned),
        content,
        tool_calls,
        finish_reason,
    ))
}

/// Map an `OpenAI` `finish_reason` token
pub(super) fn finish_reason(token: &str) -> FinishReason {
    match token {
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}
