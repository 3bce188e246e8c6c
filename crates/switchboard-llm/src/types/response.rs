use super::message::CanonicalMessage;

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Model decided to call a tool
    ToolCalls,
    /// Hit the token limit
    Length,
    /// Upstream payload could not be translated
    Error,
}

impl FinishReason {
    /// `finish_reason` token on the `OpenAI` surface
    pub const fn openai(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::ToolCalls => "tool_calls",
            Self::Length => "length",
            Self::Error => "error",
        }
    }

    /// `stop_reason` token on the Anthropic surface
    pub const fn anthropic(self) -> &'static str {
        match self {
            Self::Stop => "end_turn",
            Self::ToolCalls => "tool_use",
            Self::Length => "max_tokens",
            Self::Error => "error",
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Backend-agnostic chat completion
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalResponse {
    pub id: String,
    pub model: String,
    pub message: CanonicalMessage,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}
