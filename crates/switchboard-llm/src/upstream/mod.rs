//! Upstream model providers
//!
//! The router only sees [`UpstreamClient`]: canonical messages in, the
//! provider's raw JSON payload out. Shaping that payload into a canonical
//! response is the normalizers' job.

mod http;
mod prompt;

use async_trait::async_trait;
use serde_json::Value;
use switchboard_config::{BackendKind, ProviderKind};

pub use self::http::HttpUpstream;
use crate::error::LlmError;
use crate::types::{CanonicalMessage, GenerationParams, ToolChoice, ToolDefinition};

/// Per-call settings resolved from the request and the model's capabilities
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Model id as sent by the client
    pub model: String,
    /// Which configured upstream serves the model
    pub provider: ProviderKind,
    /// Tools are sent natively; otherwise they are described in the prompt
    pub native_tools: bool,
    pub tool_choice: Option<ToolChoice>,
    pub params: GenerationParams,
}

/// A source of raw model completions
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Run one non-streaming completion and return the provider's payload
    ///
    /// Never retried here; callers own retry policy.
    async fn call(
        &self,
        backend: BackendKind,
        messages: &[CanonicalMessage],
        tools: &[ToolDefinition],
        options: &CallOptions,
    ) -> Result<Value, LlmError>;
}
