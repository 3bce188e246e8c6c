use super::message::CanonicalMessage;
use super::tool::{ToolChoice, ToolDefinition};

/// Wire protocol spoken by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProtocol {
    /// `POST /v1/chat/completions`
    OpenAi,
    /// `POST /v1/messages`
    Anthropic,
}

/// Parameters controlling text generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
}

/// Client request after the inbound conversation bridge
#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    pub model: String,
    pub messages: Vec<CanonicalMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
    pub params: GenerationParams,
    pub stream: bool,
    /// Client asked for usage on the final stream chunk
    pub include_usage: bool,
}
