use std::borrow::Cow;

use serde_json::{Map, Value};

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool result
    Tool,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Arguments of a tool call as produced by a normalizer
///
/// Repair turns every call into `Encoded` holding valid JSON text.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    /// JSON text, not yet validated
    Encoded(String),
    /// Structured value that still needs serializing
    Value(Value),
}

impl ToolArguments {
    /// The encoded JSON text, serializing a structured value if needed
    pub fn to_json(&self) -> Cow<'_, str> {
        match self {
            Self::Encoded(text) => Cow::Borrowed(text),
            Self::Value(value) => Cow::Owned(value.to_string()),
        }
    }

    /// Parse the arguments into a JSON value, falling back to an empty object
    pub fn to_value(&self) -> Value {
        match self {
            Self::Encoded(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Map::new())),
            Self::Value(value) => value.clone(),
        }
    }
}

impl Default for ToolArguments {
    fn default() -> Self {
        Self::Encoded(String::new())
    }
}

/// A tool invocation requested by the assistant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCall {
    /// Prefix-agnostic identifier, unique within a message once repaired
    pub id: String,
    /// Function to invoke
    pub function_name: String,
    /// Function arguments
    pub arguments: ToolArguments,
    /// Leftover fields from the upstream payload, consulted by repair
    pub extra: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, function_name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments,
            extra: Map::new(),
        }
    }
}

/// Backend-agnostic chat message
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMessage {
    pub role: Role,
    /// Text content; empty whenever `tool_calls` is non-empty on normalized output
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    /// Set only when `role` is `Tool`
    pub tool_call_id: Option<String>,
}

impl CanonicalMessage {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn consisting only of tool calls
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Result of a previous tool call
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
