//! HTTP upstream client
//!
//! One endpoint per configured provider kind. Requests are built from the
//! canonical history in the provider's own wire format and the response body
//! is returned as raw JSON.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use switchboard_config::{BackendKind, ProviderKind, UpstreamsConfig};
use url::Url;

use super::{CallOptions, UpstreamClient, prompt};
use crate::bridge;
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicContent, AnthropicRequest};
use crate::protocol::gemini::{
    GeminiContent, GeminiFunctionCall, GeminiFunctionCallingConfig, GeminiFunctionDeclaration, GeminiFunctionResponse,
    GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiTool, GeminiToolConfig,
};
use crate::protocol::openai::{OpenAiRequest, OpenAiStop};
use crate::types::{CanonicalMessage, Role, ToolChoice, ToolDefinition};

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic requires `max_tokens`; used when neither client nor capability sets one
const ANTHROPIC_FALLBACK_MAX_TOKENS: u32 = 4096;

struct Endpoint {
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl Endpoint {
    fn url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{path}")
    }
}

/// [`UpstreamClient`] speaking each provider's HTTP API
pub struct HttpUpstream {
    client: Client,
    endpoints: HashMap<ProviderKind, Endpoint>,
}

impl HttpUpstream {
    /// Build a client for every configured upstream
    ///
    /// # Errors
    ///
    /// Returns an error if an upstream timeout cannot be parsed
    pub fn from_config(config: &UpstreamsConfig) -> anyhow::Result<Self> {
        let endpoints = config
            .iter()
            .map(|(kind, upstream)| {
                let timeout = upstream
                    .timeout()
                    .with_context(|| format!("invalid timeout for upstream '{}'", kind.as_str()))?;

                Ok((
                    kind,
                    Endpoint {
                        base_url: upstream.base_url.clone(),
                        api_key: upstream.api_key.clone(),
                        timeout,
                    },
                ))
            })
            .collect::<anyhow::Result<_>>()?;

        Ok(Self {
            client: Client::new(),
            endpoints,
        })
    }

    fn openai(
        &self,
        endpoint: &Endpoint,
        messages: &[CanonicalMessage],
        tools: &[ToolDefinition],
        options: &CallOptions,
    ) -> RequestBuilder {
        let body = OpenAiRequest {
            model: options.model.clone(),
            messages: bridge::openai::messages_from_canonical(messages),
            temperature: options.params.temperature,
            top_p: options.params.top_p,
            max_tokens: options.params.max_tokens,
            max_completion_tokens: None,
            stop: stop_sequences(&options.params.stop).map(OpenAiStop::Many),
            stream: None,
            tools: (!tools.is_empty()).then(|| bridge::openai::tools_from_canonical(tools)),
            tool_choice: tool_choice(tools, options).map(bridge::openai::tool_choice_from_canonical),
            stream_options: None,
        };

        let builder = self.client.post(endpoint.url("chat/completions")).json(&body);
        match &endpoint.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    fn anthropic(
        &self,
        endpoint: &Endpoint,
        messages: &[CanonicalMessage],
        tools: &[ToolDefinition],
        options: &CallOptions,
    ) -> RequestBuilder {
        let (system, messages) = bridge::anthropic::messages_from_canonical(messages);

        let body = AnthropicRequest {
            model: options.model.clone(),
            max_tokens: Some(options.params.max_tokens.unwrap_or(ANTHROPIC_FALLBACK_MAX_TOKENS)),
            system: system.map(AnthropicContent::Text),
            messages,
            temperature: options.params.temperature,
            top_p: options.params.top_p,
            stop_sequences: stop_sequences(&options.params.stop),
            stream: None,
            tools: (!tools.is_empty()).then(|| bridge::anthropic::tools_from_canonical(tools)),
            tool_choice: tool_choice(tools, options).map(bridge::anthropic::tool_choice_from_canonical),
        };

        let builder = self
            .client
            .post(endpoint.url("messages"))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        match &endpoint.api_key {
            Some(key) => builder.header("x-api-key", key.expose_secret()),
            None => builder,
        }
    }

    fn gemini(
        &self,
        endpoint: &Endpoint,
        messages: &[CanonicalMessage],
        tools: &[ToolDefinition],
        options: &CallOptions,
    ) -> RequestBuilder {
        let body = gemini_request(messages, tools, options);
        let url = endpoint.url(&format!("models/{}:generateContent", options.model));

        let builder = self.client.post(url).json(&body);
        match &endpoint.api_key {
            Some(key) => builder.header("x-goog-api-key", key.expose_secret()),
            None => builder,
        }
    }

    fn text(&self, endpoint: &Endpoint, messages: &[CanonicalMessage], options: &CallOptions) -> RequestBuilder {
        let mut body = json!({
            "model": options.model,
            "prompt": flatten_prompt(messages),
        });

        let params = &options.params;
        let fields = [
            ("max_tokens", params.max_tokens.map(Value::from)),
            ("temperature", params.temperature.map(Value::from)),
            ("top_p", params.top_p.map(Value::from)),
            ("stop", stop_sequences(&params.stop).map(Value::from)),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                body[key] = value;
            }
        }

        let builder = self.client.post(endpoint.url("completions")).json(&body);
        match &endpoint.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn call(
        &self,
        backend: BackendKind,
        messages: &[CanonicalMessage],
        tools: &[ToolDefinition],
        options: &CallOptions,
    ) -> Result<Value, LlmError> {
        let provider = options.provider;
        let endpoint = self
            .endpoints
            .get(&provider)
            .ok_or_else(|| LlmError::UpstreamNotConfigured {
                provider,
                model: options.model.clone(),
            })?;

        // Models without native tool support get the tools in their prompt
        let prompted;
        let (messages, tools) = if !options.native_tools && !tools.is_empty() {
            tracing::debug!(model = %options.model, backend = ?backend, "describing tools in the prompt");
            prompted = prompt::render(messages, tools, options.tool_choice.as_ref());
            (prompted.as_slice(), &[][..])
        } else {
            (messages, tools)
        };

        let builder = match provider {
            ProviderKind::Openai => self.openai(endpoint, messages, tools, options),
            ProviderKind::Anthropic => self.anthropic(endpoint, messages, tools, options),
            ProviderKind::Gemini => self.gemini(endpoint, messages, tools, options),
            ProviderKind::Text => self.text(endpoint, messages, options),
        };

        let response = builder
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|e| transport_error(provider, &e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| transport_error(provider, &e))?;

        if !status.is_success() {
            tracing::warn!(provider = provider.as_str(), status = %status, "upstream returned error");
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        // Text endpoints may answer with a bare string
        Ok(serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned())))
    }
}

fn transport_error(provider: ProviderKind, error: &reqwest::Error) -> LlmError {
    if error.is_timeout() {
        tracing::warn!(provider = provider.as_str(), error = %error, "upstream request timed out");
        LlmError::Timeout(error.to_string())
    } else {
        tracing::error!(provider = provider.as_str(), error = %error, "upstream request failed");
        LlmError::Transport(error.to_string())
    }
}

/// Tool choice to forward; dropped when no tools are sent
fn tool_choice<'a>(tools: &[ToolDefinition], options: &'a CallOptions) -> Option<&'a ToolChoice> {
    options.tool_choice.as_ref().filter(|_| !tools.is_empty())
}

fn stop_sequences(stop: &[String]) -> Option<Vec<String>> {
    (!stop.is_empty()).then(|| stop.to_vec())
}

fn gemini_request(messages: &[CanonicalMessage], tools: &[ToolDefinition], options: &CallOptions) -> GeminiRequest {
    let mut system = Vec::new();
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut call_names: HashMap<&str, &str> = HashMap::new();

    for message in messages {
        let (role, parts) = match message.role {
            Role::System => {
                system.push(GeminiPart::Text(message.content.clone()));
                continue;
            }
            Role::User => ("user", vec![GeminiPart::Text(message.content.clone())]),
            Role::Assistant => {
                let mut parts = Vec::with_capacity(message.tool_calls.len() + 1);
                if !message.content.is_empty() {
                    parts.push(GeminiPart::Text(message.content.clone()));
                }
                for call in &message.tool_calls {
                    call_names.insert(&call.id, &call.function_name);
                    parts.push(GeminiPart::FunctionCall(GeminiFunctionCall {
                        name: call.function_name.clone(),
                        args: call.arguments.to_value(),
                    }));
                }
                ("model", parts)
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().unwrap_or_default();
                let response = match serde_json::from_str::<Value>(&message.content) {
                    Ok(object @ Value::Object(_)) => object,
                    _ => json!({ "content": message.content }),
                };
                let part = GeminiPart::FunctionResponse(GeminiFunctionResponse {
                    name: call_names.get(id).copied().unwrap_or_else(|| bridge::ids::tool_text(id)).to_owned(),
                    response,
                });
                ("user", vec![part])
            }
        };

        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
            _ => contents.push(GeminiContent {
                role: Some(role.to_owned()),
                parts,
            }),
        }
    }

    let tool_config = tool_choice(tools, options).map(|choice| {
        let (mode, allowed) = match choice {
            ToolChoice::Auto => ("AUTO", None),
            ToolChoice::None => ("NONE", None),
            ToolChoice::Required => ("ANY", None),
            ToolChoice::Function(name) => ("ANY", Some(vec![name.clone()])),
        };
        GeminiToolConfig {
            function_calling_config: GeminiFunctionCallingConfig {
                mode: mode.to_owned(),
                allowed_function_names: allowed,
            },
        }
    });

    GeminiRequest {
        contents,
        system_instruction: (!system.is_empty()).then_some(GeminiContent { role: None, parts: system }),
        generation_config: Some(GeminiGenerationConfig {
            temperature: options.params.temperature,
            top_p: options.params.top_p,
            max_output_tokens: options.params.max_tokens,
            stop_sequences: stop_sequences(&options.params.stop),
        }),
        tools: (!tools.is_empty()).then(|| {
            vec![GeminiTool {
                function_declarations: tools
                    .iter()
                    .map(|tool| GeminiFunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: Some(tool.parameters.clone()),
                    })
                    .collect(),
            }]
        }),
        tool_config,
    }
}

/// Single prompt string for completion-style endpoints
fn flatten_prompt(messages: &[CanonicalMessage]) -> String {
    let mut prompt = String::new();

    for message in messages {
        let speaker = match message.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Assistant:");
    prompt
}
