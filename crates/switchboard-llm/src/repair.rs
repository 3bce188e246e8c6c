//! Tool-call repair
//!
//! Guarantees structurally valid tool calls regardless of upstream output
//! quality. Repair is the expected path, so it reports what it did through
//! a flag instead of an error.

use std::collections::HashSet;

use serde_json::Value;

use crate::recover;
use crate::types::{CanonicalMessage, CanonicalResponse, FinishReason, ToolArguments, ToolCall, ToolDefinition};

/// Keys a normalizer may leave the function name under
const NAME_KEYS: &[&str] = &["name", "function_name", "tool_name", "tool"];

/// Enforce tool-call invariants on a single message
///
/// Every call gets a non-empty name, JSON-text arguments and an id unique
/// within the message; content is cleared when calls are present.
/// Idempotent: repairing a repaired message changes nothing.
pub fn repair(mut message: CanonicalMessage, tools: &[ToolDefinition]) -> (CanonicalMessage, bool) {
    let mut repaired = false;
    let mut seen_ids = HashSet::new();

    for (index, call) in message.tool_calls.iter_mut().enumerate() {
        repaired |= repair_name(call, index, tools);
        repaired |= repair_arguments(call, index);
        repaired |= repair_id(call, &mut seen_ids);
        call.extra.clear();
    }

    if message.has_tool_calls() && !message.content.is_empty() {
        message.content.clear();
        repaired = true;
    }

    (message, repaired)
}

/// Repair the response message and align the finish reason with it
pub fn repair_response(mut response: CanonicalResponse, tools: &[ToolDefinition]) -> (CanonicalResponse, bool) {
    let (message, mut repaired) = repair(response.message, tools);
    response.message = message;

    if response.message.has_tool_calls() && response.finish_reason != FinishReason::ToolCalls {
        response.finish_reason = FinishReason::ToolCalls;
        repaired = true;
    }

    (response, repaired)
}

fn repair_name(call: &mut ToolCall, index: usize, tools: &[ToolDefinition]) -> bool {
    if !call.function_name.trim().is_empty() {
        return false;
    }

    if let Some(name) = alternate_name(call) {
        tracing::debug!(index, name = %name, "tool call name recovered from alternate key");
        call.function_name = name;
    } else if let [only] = tools {
        tracing::debug!(index, name = %only.name, "tool call name taken from the only tool");
        call.function_name.clone_from(&only.name);
    } else {
        let placeholder = format!("tool_call_{index}");
        tracing::warn!(index, name = %placeholder, "tool call has no name, using placeholder");
        call.function_name = placeholder;
    }

    true
}

fn alternate_name(call: &ToolCall) -> Option<String> {
    let direct = NAME_KEYS
        .iter()
        .find_map(|key| call.extra.get(*key).and_then(Value::as_str));

    let nested = || {
        call.extra
            .get("function")
            .and_then(|function| function.get("name"))
            .and_then(Value::as_str)
    };

    direct
        .or_else(nested)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}

fn repair_arguments(call: &mut ToolCall, index: usize) -> bool {
    let fixed = match &call.arguments {
        ToolArguments::Value(Value::String(text)) => Some(encode_text(text)),
        ToolArguments::Value(Value::Null) => Some("{}".to_owned()),
        ToolArguments::Value(value) => Some(value.to_string()),
        ToolArguments::Encoded(text) => match recover::strict(text) {
            // Multiply encoded: JSON strings wrapping JSON text
            Some(value @ Value::String(_)) => {
                let inner = unwrap_strings(value.clone());
                (inner != value).then(|| inner.to_string())
            }
            Some(_) => None,
            None => Some(encode_text(text)),
        },
    };

    let Some(fixed) = fixed else {
        return false;
    };

    tracing::debug!(index, name = %call.function_name, "tool call arguments repaired");
    call.arguments = ToolArguments::Encoded(fixed);
    true
}

/// Valid JSON text for raw argument text, or `{}` if nothing can be recovered
fn encode_text(text: &str) -> String {
    if text.trim().is_empty() {
        return "{}".to_owned();
    }

    recover::parse_lenient(text).map_or_else(|| "{}".to_owned(), |value| unwrap_strings(value).to_string())
}

/// Peel string layers whose content is itself JSON, down to a fixed point
fn unwrap_strings(mut value: Value) -> Value {
    while let Value::String(inner) = &value {
        match recover::strict(inner) {
            Some(next) => value = next,
            None => break,
        }
    }
    value
}

fn repair_id(call: &mut ToolCall, seen: &mut HashSet<String>) -> bool {
    if !call.id.is_empty() && seen.insert(call.id.clone()) {
        return false;
    }

    let id = loop {
        let candidate = generate_id();
        if seen.insert(candidate.clone()) {
            break candidate;
        }
    };

    tracing::debug!(previous = %call.id, id = %id, "tool call id assigned");
    call.id = id;
    true
}

/// Fresh prefix-agnostic tool call id
pub fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}
