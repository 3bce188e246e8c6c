//! Anthropic messages surface
//!
//! History arrives as content blocks. A user turn may carry `tool_result`
//! blocks, each of which becomes its own tool message; an assistant turn may
//! carry `tool_use` blocks, which become that turn's tool calls.

use serde_json::{Value, json};

use super::{ids, object_schema};
use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse,
    AnthropicResponseBlock, AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};
use crate::types::{
    CanonicalMessage, CanonicalRequest, CanonicalResponse, ClientProtocol, GenerationParams, Role, ToolArguments,
    ToolCall, ToolChoice, ToolDefinition,
};

/// Marks a tool result the client reported as failed
const TOOL_ERROR_PREFIX: &str = "[tool error] ";

// -- Inbound: Anthropic wire format -> canonical --

impl From<AnthropicRequest> for CanonicalRequest {
    fn from(request: AnthropicRequest) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = request.system {
            let system = system.into_text();
            if !system.is_empty() {
                messages.push(CanonicalMessage::system(system));
            }
        }
        messages.extend(messages_to_canonical(request.messages));

        Self {
            model: request.model,
            messages,
            tools: request
                .tools
                .unwrap_or_default()
                .into_iter()
                .map(|tool| ToolDefinition {
                    name: tool.name,
                    description: tool.description,
                    parameters: object_schema(Some(tool.input_schema)),
                })
                .collect(),
            tool_choice: request.tool_choice.as_ref().and_then(tool_choice_to_canonical),
            params: GenerationParams {
                temperature: request.temperature,
                top_p: request.top_p,
                max_tokens: request.max_tokens,
                stop: request.stop_sequences.unwrap_or_default(),
            },
            stream: request.stream.unwrap_or(false),
            include_usage: true,
        }
    }
}

/// Convert Anthropic message history
pub fn messages_to_canonical(messages: Vec<AnthropicMessage>) -> Vec<CanonicalMessage> {
    let mut canonical = Vec::with_capacity(messages.len());

    for message in messages {
        match (message.role.as_str(), message.content) {
            ("assistant", AnthropicContent::Text(text)) => canonical.push(CanonicalMessage::assistant(text)),
            ("assistant", AnthropicContent::Blocks(blocks)) => canonical.push(assistant_to_canonical(blocks)),
            (_, AnthropicContent::Text(text)) => canonical.push(CanonicalMessage::user(text)),
            (_, AnthropicContent::Blocks(blocks)) => user_to_canonical(blocks, &mut canonical),
        }
    }

    canonical
}

fn assistant_to_canonical(blocks: Vec<AnthropicContentBlock>) -> CanonicalMessage {
    let mut text = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            AnthropicContentBlock::Text { text: part } => text.push(part),
            AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall::new(
                ids::tool_to_canonical(&id),
                name,
                ToolArguments::Encoded(input.to_string()),
            )),
            AnthropicContentBlock::ToolResult { .. } | AnthropicContentBlock::Unsupported => {}
        }
    }

    let mut message = CanonicalMessage::assistant(text.join("\n"));
    message.tool_calls = tool_calls;
    message
}

/// Split a user turn into tool results followed by the remaining text
fn user_to_canonical(blocks: Vec<AnthropicContentBlock>, out: &mut Vec<CanonicalMessage>) {
    let mut text = Vec::new();

    for block in blocks {
        match block {
            AnthropicContentBlock::Text { text: part } => text.push(part),
            AnthropicContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let mut result = content.map(AnthropicContent::into_text).unwrap_or_default();
                if is_error == Some(true) {
                    result.insert_str(0, TOOL_ERROR_PREFIX);
                }
                out.push(CanonicalMessage::tool_result(ids::tool_to_canonical(&tool_use_id), result));
            }
            AnthropicContentBlock::ToolUse { .. } | AnthropicContentBlock::Unsupported => {}
        }
    }

    if !text.is_empty() {
        out.push(CanonicalMessage::user(text.join("\n")));
    }
}

fn tool_choice_to_canonical(choice: &AnthropicToolChoice) -> Option<ToolChoice> {
    match choice.choice_type.as_str() {
        "auto" => Some(ToolChoice::Auto),
        "any" => Some(ToolChoice::Required),
        "none" => Some(ToolChoice::None),
        "tool" => choice.name.clone().map(ToolChoice::Function),
        _ => None,
    }
}

// -- Outbound: canonical -> Anthropic wire format --

/// Convert canonical history to an Anthropic system prompt and messages
///
/// System messages are joined into the top-level prompt. Consecutive turns
/// with the same role are merged, since the API requires alternation.
pub fn messages_from_canonical(messages: &[CanonicalMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system = Vec::new();
    let mut out: Vec<AnthropicMessage> = Vec::new();

    for message in messages {
        let (role, blocks) = match message.role {
            Role::System => {
                system.push(message.content.as_str());
                continue;
            }
            Role::User => ("user", text_blocks(&message.content)),
            Role::Tool => ("user", vec![tool_result_block(message)]),
            Role::Assistant => ("assistant", assistant_blocks(message)),
        };

        match out.last_mut() {
            Some(last) if last.role == role => append_blocks(&mut last.content, blocks),
            _ => out.push(AnthropicMessage {
                role: role.to_owned(),
                content: compact(blocks),
            }),
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, out)
}

fn text_blocks(text: &str) -> Vec<AnthropicContentBlock> {
    vec![AnthropicContentBlock::Text { text: text.to_owned() }]
}

fn tool_result_block(message: &CanonicalMessage) -> AnthropicContentBlock {
    let (content, is_error) = message
        .content
        .strip_prefix(TOOL_ERROR_PREFIX)
        .map_or((message.content.as_str(), None), |rest| (rest, Some(true)));

    AnthropicContentBlock::ToolResult {
        tool_use_id: ids::tool_for(ClientProtocol::Anthropic, message.tool_call_id.as_deref().unwrap_or_default()),
        content: Some(AnthropicContent::Text(content.to_owned())),
        is_error,
    }
}

fn assistant_blocks(message: &CanonicalMessage) -> Vec<AnthropicContentBlock> {
    let mut blocks = Vec::with_capacity(message.tool_calls.len() + 1);

    if !message.content.is_empty() || message.tool_calls.is_empty() {
        blocks.push(AnthropicContentBlock::Text {
            text: message.content.clone(),
        });
    }

    blocks.extend(message.tool_calls.iter().map(|call| AnthropicContentBlock::ToolUse {
        id: ids::tool_for(ClientProtocol::Anthropic, &call.id),
        name: call.function_name.clone(),
        input: tool_input(&call.arguments),
    }));

    blocks
}

/// A lone text block collapses to the string shorthand
fn compact(mut blocks: Vec<AnthropicContentBlock>) -> AnthropicContent {
    if let [AnthropicContentBlock::Text { text }] = blocks.as_mut_slice() {
        return AnthropicContent::Text(std::mem::take(text));
    }
    AnthropicContent::Blocks(blocks)
}

fn append_blocks(content: &mut AnthropicContent, blocks: Vec<AnthropicContentBlock>) {
    match content {
        AnthropicContent::Blocks(existing) => existing.extend(blocks),
        AnthropicContent::Text(text) => {
            let mut merged = text_blocks(text);
            merged.extend(blocks);
            *content = AnthropicContent::Blocks(merged);
        }
    }
}

/// Tool definitions in Anthropic shape
pub fn tools_from_canonical(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| AnthropicTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.parameters.clone(),
        })
        .collect()
}

/// Tool choice in Anthropic shape
pub fn tool_choice_from_canonical(choice: &ToolChoice) -> AnthropicToolChoice {
    let (choice_type, name) = match choice {
        ToolChoice::Auto => ("auto", None),
        ToolChoice::None => ("none", None),
        ToolChoice::Required => ("any", None),
        ToolChoice::Function(name) => ("tool", Some(name.clone())),
    };

    AnthropicToolChoice {
        choice_type: choice_type.to_owned(),
        name,
    }
}

/// Response content blocks: text first when present, then one block per call
pub fn response_blocks(message: &CanonicalMessage) -> Vec<AnthropicResponseBlock> {
    let mut blocks = Vec::with_capacity(message.tool_calls.len() + 1);

    if !message.content.is_empty() || message.tool_calls.is_empty() {
        blocks.push(AnthropicResponseBlock::Text {
            text: message.content.clone(),
        });
    }

    blocks.extend(message.tool_calls.iter().map(|call| AnthropicResponseBlock::ToolUse {
        id: ids::tool_for(ClientProtocol::Anthropic, &call.id),
        name: call.function_name.clone(),
        input: tool_input(&call.arguments),
    }));

    blocks
}

/// Tool input object; non-object arguments are wrapped so the block stays valid
fn tool_input(arguments: &ToolArguments) -> Value {
    match arguments.to_value() {
        object @ Value::Object(_) => object,
        other => json!({ "value": other }),
    }
}

impl From<&CanonicalResponse> for AnthropicResponse {
    fn from(response: &CanonicalResponse) -> Self {
        Self {
            id: ids::response_for(ClientProtocol::Anthropic, &response.id),
            response_type: "message".to_owned(),
            role: Role::Assistant.as_str().to_owned(),
            content: response_blocks(&response.message),
            model: response.model.clone(),
            stop_reason: Some(response.finish_reason.anthropic().to_owned()),
            stop_sequence: None,
            usage: AnthropicUsage {
                input_tokens: response.usage.prompt_tokens,
                output_tokens: response.usage.completion_tokens,
            },
        }
    }
}
