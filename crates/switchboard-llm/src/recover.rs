//! Lenient JSON recovery for model-produced payloads
//!
//! Recovery is an ordered list of strategies. Each one is total: it either
//! yields a parsed value or `None`, and the first success wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// A single recovery attempt
pub type Strategy = fn(&str) -> Option<Value>;

/// Strategies tried by [`parse_lenient`], in order
pub const LENIENT: &[(&str, Strategy)] = &[("strict", strict), ("unfenced", unfenced), ("balanced", balanced)];

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*(?:```\s*)?$").expect("valid fence regex"));

static CALL_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"name"\s*:\s*"((?:[^"\\]|\\.)*)"\s*,\s*"(?:arguments|parameters|input|args)"\s*:"#)
        .expect("valid call regex")
});

/// Parse `text` as JSON, repairing what can be repaired deterministically
pub fn parse_lenient(text: &str) -> Option<Value> {
    LENIENT.iter().find_map(|(name, strategy)| {
        let value = strategy(text)?;
        if *name != "strict" {
            tracing::debug!(strategy = name, "recovered malformed JSON");
        }
        Some(value)
    })
}

/// Parse as-is
pub fn strict(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Strip a surrounding Markdown code fence, then parse
pub fn unfenced(text: &str) -> Option<Value> {
    strict(strip_fence(text)?)
}

/// Close unbalanced brackets and strings, drop stray closers, then parse
pub fn balanced(text: &str) -> Option<Value> {
    let body = strip_fence(text).unwrap_or(text);
    strict(&balance(body)?)
}

/// Content of a Markdown code fence wrapping the whole text
pub fn strip_fence(text: &str) -> Option<&str> {
    let captures = FENCE.captures(text)?;
    captures.get(1).map(|m| m.as_str().trim())
}

/// Rebuild the first JSON value in `text` with balanced brackets
///
/// Leading prose before the first bracket and anything after the first
/// complete top-level value are discarded.
pub fn balance(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let mut out = String::with_capacity(text.len() - start + 4);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text[start..].chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '{' => {
                closers.push('}');
                out.push(ch);
            }
            '[' => {
                closers.push(']');
                out.push(ch);
            }
            '}' | ']' => {
                // Closer with no matching opener is dropped
                if !closers.contains(&ch) {
                    continue;
                }
                while let Some(expected) = closers.pop() {
                    trim_dangling(&mut out);
                    out.push(expected);
                    if expected == ch {
                        break;
                    }
                }
            }
            _ => out.push(ch),
        }

        if closers.is_empty() {
            return Some(out);
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    while let Some(expected) = closers.pop() {
        trim_dangling(&mut out);
        out.push(expected);
    }

    Some(out)
}

/// Remove a trailing comma, or complete a trailing key with `null`
fn trim_dangling(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);

    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str("null");
    }
}

/// Extract `{"name": ..., "arguments": ...}` shaped objects anywhere in `text`
///
/// Last-resort strategy for payloads too damaged for [`parse_lenient`]. Each
/// match is cut at its balanced closing brace; an object that never closes
/// runs to the end of the text and is balanced.
pub fn call_objects(text: &str) -> Vec<Value> {
    let mut found = Vec::new();
    let mut search_from = 0;

    while let Some(captures) = CALL_START.captures_at(text, search_from) {
        let Some(whole) = captures.get(0) else { break };
        let start = whole.start();
        let end = object_end(text, start).unwrap_or(text.len());

        let candidate = &text[start..end];
        if let Some(value) = strict(candidate).or_else(|| balance(candidate).as_deref().and_then(strict)) {
            found.push(value);
        } else if let Some(name) = captures.get(1) {
            let raw_arguments = text[whole.end()..end].trim().trim_end_matches('}').trim();
            found.push(serde_json::json!({
                "name": name.as_str(),
                "arguments": raw_arguments,
            }));
        }

        search_from = end.max(whole.end());
    }

    found
}

/// Byte offset just past the brace closing the object that opens at `start`
fn object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
