//! Request routing: bridge in, call upstream, normalize, repair, render out

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use switchboard_config::{BackendKind, LlmConfig, StreamingConfig};
use switchboard_core::{HttpError, ResponseMetadata};

use crate::capability::{CapabilityEntry, CapabilityRegistry};
use crate::error::LlmError;
use crate::normalize;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse};
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse};
use crate::repair::repair_response;
use crate::stream::{self, FrameStream, Heartbeat};
use crate::types::{CanonicalRequest, CanonicalResponse, ClientProtocol, ToolDefinition};
use crate::upstream::{CallOptions, HttpUpstream, UpstreamClient};
use crate::usage;

/// A client request in the wire format it arrived in
#[derive(Debug, Clone)]
pub enum ClientRequest {
    OpenAi(OpenAiRequest),
    Anthropic(AnthropicRequest),
}

impl ClientRequest {
    pub const fn protocol(&self) -> ClientProtocol {
        match self {
            Self::OpenAi(_) => ClientProtocol::OpenAi,
            Self::Anthropic(_) => ClientProtocol::Anthropic,
        }
    }
}

impl From<ClientRequest> for CanonicalRequest {
    fn from(request: ClientRequest) -> Self {
        match request {
            ClientRequest::OpenAi(request) => request.into(),
            ClientRequest::Anthropic(request) => request.into(),
        }
    }
}

/// Non-streaming body in the client's wire format
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CompletionBody {
    OpenAi(OpenAiResponse),
    Anthropic(AnthropicResponse),
}

impl CompletionBody {
    fn render(protocol: ClientProtocol, response: &CanonicalResponse) -> Self {
        match protocol {
            ClientProtocol::OpenAi => Self::OpenAi(response.into()),
            ClientProtocol::Anthropic => Self::Anthropic(response.into()),
        }
    }
}

/// What the router hands back to the HTTP layer
pub enum ClientResponse {
    Json {
        body: CompletionBody,
        metadata: ResponseMetadata,
    },
    Stream {
        frames: FrameStream,
        metadata: ResponseMetadata,
    },
}

impl ClientResponse {
    pub const fn metadata(&self) -> ResponseMetadata {
        match self {
            Self::Json { metadata, .. } | Self::Stream { metadata, .. } => *metadata,
        }
    }
}

/// Simulated streaming settings
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub heartbeat_interval: Duration,
    pub text_chunk_chars: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            text_chunk_chars: 64,
        }
    }
}

impl StreamSettings {
    /// Settings from the `[llm.streaming]` table
    ///
    /// # Errors
    ///
    /// Returns an error if the heartbeat interval is not a valid duration
    pub fn from_config(config: &StreamingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            heartbeat_interval: config.heartbeat_interval()?,
            text_chunk_chars: config.text_chunk_chars,
        })
    }
}

/// Shared state for LLM route handlers
#[derive(Clone)]
pub struct LlmState {
    pub(crate) inner: Arc<LlmStateInner>,
}

pub(crate) struct LlmStateInner {
    pub(crate) registry: CapabilityRegistry,
    pub(crate) upstream: Arc<dyn UpstreamClient>,
    pub(crate) streaming: StreamSettings,
}

impl LlmState {
    pub fn new(registry: CapabilityRegistry, upstream: Arc<dyn UpstreamClient>, streaming: StreamSettings) -> Self {
        Self {
            inner: Arc::new(LlmStateInner {
                registry,
                upstream,
                streaming,
            }),
        }
    }

    /// Build the registry, upstream clients and stream settings from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a capability source cannot be read or an upstream
    /// fails to initialize
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let registry = CapabilityRegistry::from_source(&config.capabilities)?;
        let upstream = HttpUpstream::from_config(&config.upstreams)?;
        let streaming = StreamSettings::from_config(&config.streaming)?;

        Ok(Self::new(registry, Arc::new(upstream), streaming))
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    /// Serve one client request end to end
    ///
    /// Upstream failures are returned as errors and never retried. Payloads
    /// the normalizer cannot make sense of become a well-formed response with
    /// an error finish reason instead.
    ///
    /// Streams open before the upstream is called so heartbeats cover the
    /// wait. An upstream failure after that point ends the stream with an
    /// error finish reason, and `latency_ms` measures the time to open it.
    pub async fn handle(&self, request: ClientRequest) -> Result<ClientResponse, LlmError> {
        let started = Instant::now();
        let protocol = request.protocol();
        let mut request = CanonicalRequest::from(request);
        let entry = self.inner.registry.lookup(&request.model);

        let stream_downgraded = request.stream && !request.tools.is_empty();
        if stream_downgraded {
            tracing::debug!(
                model = %request.model,
                tools = request.tools.len(),
                "tools present, answering stream request with a single body"
            );
        }

        request.params.max_tokens.get_or_insert(entry.default_max_tokens);

        let options = CallOptions {
            model: request.model.clone(),
            provider: entry.upstream,
            native_tools: entry.supports_native_tools,
            tool_choice: request.tool_choice.clone(),
            params: request.params.clone(),
        };

        if request.stream && !stream_downgraded {
            let frames = self.stream(protocol, entry, request, options, started);
            let metadata = ResponseMetadata {
                stream_downgraded,
                latency_ms: elapsed_ms(started),
            };
            return Ok(ClientResponse::Stream { frames, metadata });
        }

        let raw = self
            .inner
            .upstream
            .call(entry.backend, &request.messages, &request.tools, &options)
            .await?;

        let response = complete(&entry, &request, &raw);
        let metadata = ResponseMetadata {
            stream_downgraded,
            latency_ms: elapsed_ms(started),
        };
        log_handled(&entry, &request, &response, metadata.latency_ms);

        Ok(ClientResponse::Json {
            body: CompletionBody::render(protocol, &response),
            metadata,
        })
    }

    fn stream(
        &self,
        protocol: ClientProtocol,
        entry: CapabilityEntry,
        request: CanonicalRequest,
        options: CallOptions,
        started: Instant,
    ) -> FrameStream {
        let settings = self.inner.streaming;
        let upstream = Arc::clone(&self.inner.upstream);

        let pending = async move {
            let response = match upstream
                .call(entry.backend, &request.messages, &request.tools, &options)
                .await
            {
                Ok(raw) => complete(&entry, &request, &raw),
                Err(error) => {
                    tracing::warn!(model = %request.model, error = %error, "upstream failed after stream opened");
                    normalize::failure_response(&request.model, error.client_message())
                }
            };
            log_handled(&entry, &request, &response, elapsed_ms(started));

            match protocol {
                ClientProtocol::OpenAi => {
                    stream::openai::frames(&response, request.include_usage, settings.text_chunk_chars)
                }
                ClientProtocol::Anthropic => stream::anthropic::frames(&response, settings.text_chunk_chars),
            }
        };

        let frame = match protocol {
            ClientProtocol::OpenAi => stream::openai::HEARTBEAT,
            ClientProtocol::Anthropic => stream::anthropic::HEARTBEAT,
        };

        stream::spawn_pending(
            pending,
            Heartbeat {
                frame: Bytes::from_static(frame),
                interval: settings.heartbeat_interval,
            },
        )
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn log_handled(entry: &CapabilityEntry, request: &CanonicalRequest, response: &CanonicalResponse, latency_ms: u64) {
    tracing::debug!(
        model = %request.model,
        backend = ?entry.backend,
        finish_reason = response.finish_reason.openai(),
        tool_calls = response.message.tool_calls.len(),
        latency_ms,
        "request handled"
    );
}

/// Normalizer for a reply from this model
///
/// A generic model that had the tools described in its prompt answers in
/// the prompted call format.
fn reply_backend(entry: &CapabilityEntry, tools: &[ToolDefinition]) -> BackendKind {
    if entry.backend == BackendKind::Generic && !entry.supports_native_tools && !tools.is_empty() {
        BackendKind::FunctionCallInText
    } else {
        entry.backend
    }
}

/// Normalize, repair and account for one upstream payload
fn complete(entry: &CapabilityEntry, request: &CanonicalRequest, raw: &Value) -> CanonicalResponse {
    let backend = reply_backend(entry, &request.tools);
    let response = match normalize::normalize(backend, raw, &request.tools, &request.model) {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(model = %request.model, error = %error, "upstream payload could not be translated");
            return normalize::error_response(&request.model);
        }
    };

    let (mut response, repaired) = repair_response(response, &request.tools);
    if repaired {
        if entry.requires_normalization {
            tracing::debug!(model = %request.model, "tool calls repaired");
        } else {
            tracing::warn!(model = %request.model, backend = ?entry.backend, "tool calls repaired for a native model");
        }
    }

    response.usage =
        usage::from_payload(raw).unwrap_or_else(|| usage::estimate(&request.messages, &response.message));

    response
}
