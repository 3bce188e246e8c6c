//! Text-only payloads of unknown shape

use serde_json::Value;
use switchboard_config::BackendKind;

use super::{Normalized, TranslationError, extract};
use crate::types::FinishReason;

/// Finish tokens that mean generation hit the token limit
const TRUNCATION_TOKENS: &[&str] = &["length", "max_tokens", "MAX_TOKENS"];

const FINISH_PATHS: &[&str] = &[
    "/choices/0/finish_reason",
    "/finish_reason",
    "/stop_reason",
    "/candidates/0/finishReason",
];

pub(super) fn normalize(raw: &Value) -> Result<Normalized, TranslationError> {
    let text = extract::response_text(raw)
        .ok_or(TranslationError::new(BackendKind::Generic, "no reply text found"))?;

    let finish_reason = if truncated(raw) {
        FinishReason::Length
    } else {
        FinishReason::Stop
    };

    Ok(Normalized::new(
        raw.get("id").and_then(Value::as_str).map(str::to_owned),
        text.to_owned(),
        Vec::new(),
        finish_reason,
    ))
}

/// Whether the payload explicitly signals truncation
pub(super) fn truncated(raw: &Value) -> bool {
    let by_token = FINISH_PATHS
        .iter()
        .filter_map(|path| raw.pointer(path).and_then(Value::as_str))
        .any(|token| TRUNCATION_TOKENS.contains(&token));

    by_token || raw.get("truncated").and_then(Value::as_bool) == Some(true)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_is_extracted_without_tool_calls() {
        let raw = json!({"output": "[{\"name\": \"f\"}]"});
        let normalized = normalize(&raw).unwrap();

        assert_eq!(normalized.message.content, "[{\"name\": \"f\"}]");
        assert!(normalized.message.tool_calls.is_empty());
        assert_eq!(normalized.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn explicit_truncation_maps_to_length() {
        for raw in [
            json!({"choices": [{"text": "a", "finish_reason": "length"}]}),
            json!({"response": "a", "truncated": true}),
            json!({"content": [{"type": "text", "text": "a"}], "stop_reason": "max_tokens"}),
        ] {
            assert_eq!(normalize(&raw).unwrap().finish_reason, FinishReason::Length, "{raw}");
        }
    }

    #[test]
    fn payload_without_text_is_unrecognized() {
        assert!(normalize(&json!({"status": 200})).is_err());
    }
}
