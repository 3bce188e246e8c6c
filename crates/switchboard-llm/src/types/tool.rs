use serde_json::Value;

/// Definition of a tool the model can call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema for the arguments
    pub parameters: Value,
}

/// How the model should select tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// Model decides whether to call tools
    Auto,
    /// Model must not call tools
    None,
    /// Model must call at least one tool
    Required,
    /// Model must call the named tool
    Function(String),
}
