//! Token usage accounting
//!
//! Upstream-reported usage wins. Text-only upstreams rarely report it, so the
//! fallback estimates both sides with the `o200k_base` tokenizer.

use std::sync::LazyLock;

use serde_json::Value;
use tiktoken_rs::{CoreBPE, o200k_base};

use crate::types::{CanonicalMessage, Usage};

/// Fixed per-message overhead for role and separators
const MESSAGE_OVERHEAD: u32 = 3;

static ENCODER: LazyLock<Option<CoreBPE>> = LazyLock::new(|| {
    o200k_base()
        .inspect_err(|error| tracing::warn!(error = %error, "tokenizer unavailable, estimating by length"))
        .ok()
});

/// (pointer to prompt count, pointer to completion count) per upstream shape
const USAGE_SHAPES: &[(&str, &str)] = &[
    ("/usage/prompt_tokens", "/usage/completion_tokens"),
    ("/usage/input_tokens", "/usage/output_tokens"),
    ("/usageMetadata/promptTokenCount", "/usageMetadata/candidatesTokenCount"),
];

/// Usage reported in an upstream payload, in any known shape
pub fn from_payload(raw: &Value) -> Option<Usage> {
    USAGE_SHAPES.iter().find_map(|(prompt, completion)| {
        let prompt = raw.pointer(prompt).and_then(Value::as_u64);
        let completion = raw.pointer(completion).and_then(Value::as_u64);

        if prompt.is_none() && completion.is_none() {
            return None;
        }

        Some(Usage::new(saturate(prompt.unwrap_or(0)), saturate(completion.unwrap_or(0))))
    })
}

/// Estimated usage for a prompt and the reply produced for it
pub fn estimate(prompt: &[CanonicalMessage], reply: &CanonicalMessage) -> Usage {
    let prompt_tokens = prompt
        .iter()
        .map(message_tokens)
        .fold(0u32, u32::saturating_add);

    Usage::new(prompt_tokens, message_tokens(reply).saturating_sub(MESSAGE_OVERHEAD))
}

fn message_tokens(message: &CanonicalMessage) -> u32 {
    message
        .tool_calls
        .iter()
        .map(|call| count(&call.function_name).saturating_add(count(&call.arguments.to_json())))
        .fold(count(&message.content).saturating_add(MESSAGE_OVERHEAD), u32::saturating_add)
}

/// Token count of `text`
pub fn count(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let tokens = ENCODER
        .as_ref()
        .map_or(text.len() / 4, |bpe| bpe.encode_with_special_tokens(text).len());

    u32::try_from(tokens).unwrap_or(u32::MAX)
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{ToolArguments, ToolCall};

    #[test]
    fn openai_usage_is_read() {
        let raw = json!({"usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}});
        assert_eq!(from_payload(&raw), Some(Usage::new(12, 5)));
    }

    #[test]
    fn anthropic_usage_is_read() {
        let raw = json!({"usage": {"input_tokens": 8, "output_tokens": 2}});
        assert_eq!(from_payload(&raw), Some(Usage::new(8, 2)));
    }

    #[test]
    fn gemini_usage_is_read() {
        let raw = json!({"usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 9}});
        assert_eq!(from_payload(&raw), Some(Usage::new(4, 9)));
    }

    #[test]
    fn missing_usage_is_none() {
        assert_eq!(from_payload(&json!({"choices": []})), None);
        assert_eq!(from_payload(&json!("text")), None);
    }

    #[test]
    fn estimate_counts_both_sides() {
        let prompt = [CanonicalMessage::system("You are terse."), CanonicalMessage::user("Say hello")];
        let reply = CanonicalMessage::assistant("Hello there, friend.");

        let usage = estimate(&prompt, &reply);
        assert!(usage.prompt_tokens > 2 * MESSAGE_OVERHEAD);
        assert!(usage.completion_tokens > 0);
        assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
    }

    #[test]
    fn tool_calls_count_toward_completion() {
        let reply = CanonicalMessage::assistant_tool_calls(vec![ToolCall::new(
            "a",
            "lookup",
            ToolArguments::Encoded(r#"{"id": 5}"#.to_owned()),
        )]);

        assert!(estimate(&[], &reply).completion_tokens > 0);
    }

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(count(""), 0);
    }
}
