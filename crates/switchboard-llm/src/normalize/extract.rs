//! Response text extraction
//!
//! Known field paths first, then an exhaustive search. The paths resolve
//! nearly every real payload; the search only runs when they miss.

use serde_json::Value;

/// Field paths checked before the exhaustive search, in priority order
const PRIMARY_PATHS: &[&str] = &["/choices/0/message/content", "/choices/0/text"];

/// Keys whose string value is taken as the reply text
const TEXT_KEYS: &[&str] = &["content", "text", "output", "response", "generated_text", "completion"];

const MAX_DEPTH: usize = 32;

/// Best-effort reply text of an arbitrary upstream payload
pub fn response_text(raw: &Value) -> Option<&str> {
    if let Some(text) = raw.as_str() {
        return Some(text);
    }

    PRIMARY_PATHS
        .iter()
        .find_map(|path| raw.pointer(path).and_then(Value::as_str))
        .or_else(|| search(raw, 0))
}

fn search(value: &Value, depth: usize) -> Option<&str> {
    if depth > MAX_DEPTH {
        return None;
    }

    match value {
        Value::Object(fields) => TEXT_KEYS
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .or_else(|| fields.values().find_map(|child| search(child, depth + 1))),
        Value::Array(items) => items.iter().find_map(|item| search(item, depth + 1)),
        _ => None,
    }
}
