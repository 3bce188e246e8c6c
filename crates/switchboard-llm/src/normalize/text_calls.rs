//! Function calls embedded in reply text
//!
//! Prompted models emit calls inside a tagged region such as
//! `<function_calls>[...]</function_calls>`, as an array or a single object.
//! A reply that is nothing but a call payload is accepted without tags.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use switchboard_config::BackendKind;

use super::{ARGUMENT_KEYS, Normalized, TranslationError, extract, generic, passthrough, tool_call_from_value};
use crate::recover;
use crate::types::{FinishReason, ToolCall, ToolDefinition};

static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(function_calls|tool_calls|tool_call|function_call)>").expect("valid tag regex"));

pub(super) fn normalize(raw: &Value, tools: &[ToolDefinition]) -> Result<Normalized, TranslationError> {
    let native_calls = raw
        .pointer("/choices/0/message/tool_calls")
        .and_then(Value::as_array)
        .is_some_and(|calls| !calls.is_empty());

    if native_calls {
        return passthrough::normalize(raw);
    }

    // A payload that is itself a call list has no reply text of its own
    let (text, tool_calls) = if looks_like_calls(raw) {
        (String::new(), payload_calls(raw))
    } else {
        let text = extract::response_text(raw)
            .ok_or(TranslationError::new(BackendKind::FunctionCallInText, "no reply text found"))?;
        (text.to_owned(), extract_calls(text, tools))
    };

    let finish_reason = if generic::truncated(raw) {
        FinishReason::Length
    } else {
        FinishReason::Stop
    };

    Ok(Normalized::new(
        raw.get("id").and_then(Value::as_str).map(str::to_owned),
        text,
        tool_calls,
        finish_reason,
    ))
}

/// Tool calls written into `text`
///
/// Every tagged region is parsed; a region missing its closing tag runs to
/// the end of the text. Without tags, the whole text must be a call payload
/// whose objects carry a name plus arguments, or name a declared tool.
pub fn extract_calls(text: &str, tools: &[ToolDefinition]) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut tagged = false;
    let mut cursor = 0;

    while let Some(captures) = OPEN_TAG.captures_at(text, cursor) {
        let (Some(open), Some(tag)) = (captures.get(0), captures.get(1)) else {
            break;
        };
        tagged = true;

        let close = format!("</{}>", tag.as_str());
        let body_start = open.end();
        let (body_end, next) = text[body_start..].find(&close).map_or((text.len(), text.len()), |offset| {
            (body_start + offset, body_start + offset + close.len())
        });

        calls.extend(region_calls(&text[body_start..body_end]));
        cursor = next;
    }

    if tagged {
        return calls;
    }

    bare_calls(text, tools)
}

fn region_calls(body: &str) -> Vec<ToolCall> {
    let parsed: Vec<_> = recover::parse_lenient(body)
        .map(candidates)
        .unwrap_or_default()
        .iter()
        .filter(|value| call_shape(value).is_some_and(|(name, arguments)| name.is_some() || arguments))
        .filter_map(tool_call_from_value)
        .collect();

    if !parsed.is_empty() {
        return parsed;
    }

    let found = recover::call_objects(body);
    if !found.is_empty() {
        tracing::debug!(count = found.len(), "recovered call objects from damaged region");
    }
    found.iter().filter_map(tool_call_from_value).collect()
}

fn payload_calls(raw: &Value) -> Vec<ToolCall> {
    candidates(raw.clone())
        .iter()
        .filter(|value| call_shape(value).is_some_and(|(name, arguments)| name.is_some() || arguments))
        .filter_map(tool_call_from_value)
        .collect()
}

/// Top-level objects of a parsed region: the items of an array or a single object
fn candidates(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => Vec::new(),
    }
}

fn bare_calls(text: &str, tools: &[ToolDefinition]) -> Vec<ToolCall> {
    let body = recover::strip_fence(text).unwrap_or(text).trim();
    if !body.starts_with(['{', '[']) {
        return Vec::new();
    }

    let items = recover::parse_lenient(body).map(candidates).unwrap_or_default();

    let declared = |name: &str| tools.iter().any(|tool| tool.name == name);

    items
        .iter()
        .filter(|value| {
            call_shape(value).is_some_and(|(name, arguments)| name.is_some_and(|name| arguments || declared(name)))
        })
        .filter_map(tool_call_from_value)
        .collect()
}

/// Name and whether arguments are present, for an object shaped like a call
fn call_shape(value: &Value) -> Option<(Option<&str>, bool)> {
    let object = value.as_object()?;
    let function = object.get("function").and_then(Value::as_object);

    let name = object
        .get("name")
        .or_else(|| function.and_then(|function| function.get("name")))
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty());

    let arguments = ARGUMENT_KEYS
        .iter()
        .any(|key| object.contains_key(*key) || function.is_some_and(|function| function.contains_key(*key)));

    Some((name, arguments))
}

/// Raw payload that is itself a call object or a list of them
fn looks_like_calls(raw: &Value) -> bool {
    let first = match raw {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(raw),
        _ => None,
    };

    first
        .and_then(call_shape)
        .is_some_and(|(name, arguments)| name.is_some() && arguments)
}
