//! Typed content-block payloads: Anthropic `content` and Gemini `parts`

use serde_json::Value;
use switchboard_config::BackendKind;

use super::{Normalized, TranslationError, tool_call_from_value};
use crate::types::{FinishReason, ToolCall};

pub(super) fn normalize(raw: &Value) -> Result<Normalized, TranslationError> {
    if let Some(blocks) = raw.as_array() {
        return Ok(walk_blocks(blocks, None, FinishReason::Stop));
    }

    if let Some(blocks) = raw.get("content").and_then(Value::as_array) {
        let finish_reason = match raw.get("stop_reason").and_then(Value::as_str) {
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Stop,
        };
        let id = raw.get("id").and_then(Value::as_str).map(str::to_owned);
        return Ok(walk_blocks(blocks, id, finish_reason));
    }

    if let Some(candidate) = raw.pointer("/candidates/0") {
        return walk_parts(candidate);
    }

    Err(TranslationError::new(
        BackendKind::BlockContent,
        "expected a block list, an Anthropic message or Gemini candidates",
    ))
}

/// Anthropic-style blocks: text accumulates, tool invocations become calls
fn walk_blocks(blocks: &[Value], id: Option<String>, finish_reason: FinishReason) -> Normalized {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    content.push_str(text);
                }
            }
            Some("tool_use" | "function_call" | "function") => {
                tool_calls.extend(tool_call_from_value(block));
            }
            other => tracing::debug!(block_type = ?other, "skipping content block"),
        }
    }

    Normalized::new(id, content, tool_calls, finish_reason)
}

/// Gemini candidate parts: `text` and `functionCall`
fn walk_parts(candidate: &Value) -> Result<Normalized, TranslationError> {
    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let finish_token = candidate.get("finishReason").and_then(Value::as_str);

    if parts.is_empty() && finish_token.is_none() {
        return Err(TranslationError::new(BackendKind::BlockContent, "candidate has no parts"));
    }

    let mut content = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for part in parts {
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            continue;
        }

        if let Some(text) = part.get("text").and_then(Value::as_str) {
            content.push_str(text);
        } else if let Some(call) = part.get("functionCall").and_then(tool_call_from_value) {
            tool_calls.push(call);
        }
    }

    let finish_reason = match finish_token {
        Some("MAX_TOKENS") => FinishReason::Length,
        _ => FinishReason::Stop,
    };

    Ok(Normalized::new(None, content, tool_calls, finish_reason))
}
