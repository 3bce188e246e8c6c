//! Conversation bridge between client wire formats and canonical types
//!
//! Each submodule converts one protocol in both directions: client requests
//! and history inbound, responses and history outbound.

pub mod anthropic;
pub mod ids;
pub mod openai;

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

/// Seconds since the Unix epoch, for `created` fields
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Schema used when a client declares a tool without one
pub(crate) fn object_schema(parameters: Option<Value>) -> Value {
    match parameters {
        Some(Value::Null) | None => json!({"type": "object", "properties": {}}),
        Some(schema) => schema,
    }
}
