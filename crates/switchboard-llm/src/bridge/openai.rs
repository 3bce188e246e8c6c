//! `OpenAI` chat completion surface

use serde_json::{Value, json};

use super::{ids, object_schema, unix_now};
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiFunction, OpenAiFunctionCall, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::types::{
    CanonicalMessage, CanonicalRequest, CanonicalResponse, ClientProtocol, GenerationParams, Role, ToolArguments,
    ToolCall, ToolChoice, ToolDefinition, Usage,
};

// -- Inbound: OpenAI wire format -> canonical --

impl From<OpenAiRequest> for CanonicalRequest {
    fn from(request: OpenAiRequest) -> Self {
        let include_usage = request
            .stream_options
            .as_ref()
            .is_some_and(|options| options.include_usage);

        Self {
            model: request.model,
            messages: messages_to_canonical(request.messages),
            tools: request
                .tools
                .unwrap_or_default()
                .into_iter()
                .map(|tool| ToolDefinition {
                    name: tool.function.name,
                    description: tool.function.description,
                    parameters: object_schema(tool.function.parameters),
                })
                .collect(),
            tool_choice: request.tool_choice.as_ref().and_then(tool_choice_to_canonical),
            params: GenerationParams {
                temperature: request.temperature,
                top_p: request.top_p,
                max_tokens: request.max_completion_tokens.or(request.max_tokens),
                stop: request.stop.map(|stop| stop.into_vec()).unwrap_or_default(),
            },
            stream: request.stream.unwrap_or(false),
            include_usage,
        }
    }
}

/// Convert `OpenAI` message history
pub fn messages_to_canonical(messages: Vec<OpenAiMessage>) -> Vec<CanonicalMessage> {
    messages.into_iter().map(message_to_canonical).collect()
}

fn message_to_canonical(message: OpenAiMessage) -> CanonicalMessage {
    let content = message.content.map(OpenAiContent::into_text).unwrap_or_default();

    match message.role.as_str() {
        "system" | "developer" => CanonicalMessage::system(content),
        "assistant" => {
            let mut canonical = CanonicalMessage::assistant(content);
            canonical.tool_calls = message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|call| {
                    ToolCall::new(
                        ids::tool_to_canonical(&call.id),
                        call.function.name,
                        ToolArguments::Encoded(call.function.arguments),
                    )
                })
                .collect();
            canonical
        }
        "tool" | "function" => CanonicalMessage::tool_result(
            message
                .tool_call_id
                .as_deref()
                .map(ids::tool_to_canonical)
                .unwrap_or_default(),
            content,
        ),
        _ => CanonicalMessage::user(content),
    }
}

/// Parse the flexible `tool_choice` field
fn tool_choice_to_canonical(value: &Value) -> Option<ToolChoice> {
    match value {
        Value::String(mode) => match mode.as_str() {
            "none" => Some(ToolChoice::None),
            "auto" => Some(ToolChoice::Auto),
            "required" => Some(ToolChoice::Required),
            _ => None,
        },
        Value::Object(_) => value
            .pointer("/function/name")
            .and_then(Value::as_str)
            .map(|name| ToolChoice::Function(name.to_owned())),
        _ => None,
    }
}

// -- Outbound: canonical -> OpenAI wire format --

/// Convert canonical history back to `OpenAI` messages
pub fn messages_from_canonical(messages: &[CanonicalMessage]) -> Vec<OpenAiMessage> {
    messages.iter().map(message_from_canonical).collect()
}

fn message_from_canonical(message: &CanonicalMessage) -> OpenAiMessage {
    let tool_calls = message.has_tool_calls().then(|| tool_calls_from_canonical(&message.tool_calls));

    // Assistant turns that only call tools carry a null content
    let content = if tool_calls.is_some() && message.content.is_empty() {
        None
    } else {
        Some(OpenAiContent::Text(message.content.clone()))
    };

    OpenAiMessage {
        role: message.role.as_str().to_owned(),
        content,
        name: None,
        tool_calls,
        tool_call_id: message
            .tool_call_id
            .as_deref()
            .map(|id| ids::tool_for(ClientProtocol::OpenAi, id)),
    }
}

fn tool_calls_from_canonical(calls: &[ToolCall]) -> Vec<OpenAiToolCall> {
    calls
        .iter()
        .map(|call| OpenAiToolCall {
            id: ids::tool_for(ClientProtocol::OpenAi, &call.id),
            tool_type: "function".to_owned(),
            function: OpenAiFunctionCall {
                name: call.function_name.clone(),
                arguments: call.arguments.to_json().into_owned(),
            },
        })
        .collect()
}

/// Tool definitions in `OpenAI` shape
pub fn tools_from_canonical(tools: &[ToolDefinition]) -> Vec<OpenAiTool> {
    tools
        .iter()
        .map(|tool| OpenAiTool {
            tool_type: "function".to_owned(),
            function: OpenAiFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: Some(tool.parameters.clone()),
            },
        })
        .collect()
}

/// Tool choice in `OpenAI` shape
pub fn tool_choice_from_canonical(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

impl From<Usage> for OpenAiUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

impl From<&CanonicalResponse> for OpenAiResponse {
    fn from(response: &CanonicalResponse) -> Self {
        let message = &response.message;

        Self {
            id: ids::response_for(ClientProtocol::OpenAi, &response.id),
            object: "chat.completion".to_owned(),
            created: unix_now(),
            model: response.model.clone(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiChoiceMessage {
                    role: Role::Assistant.as_str().to_owned(),
                    content: Some(message.content.clone()),
                    tool_calls: message
                        .has_tool_calls()
                        .then(|| tool_calls_from_canonical(&message.tool_calls)),
                },
                finish_reason: Some(response.finish_reason.openai().to_owned()),
            }],
            usage: Some(response.usage.into()),
        }
    }
}
