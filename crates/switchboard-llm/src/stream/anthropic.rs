//! Content-block event stream for the Anthropic surface

use bytes::Bytes;
use serde_json::json;

use super::{encode, text_chunks};
use crate::bridge::ids;
use crate::protocol::anthropic::{
    AnthropicDeltaUsage, AnthropicMessageDelta, AnthropicStreamContentBlock, AnthropicStreamDelta,
    AnthropicStreamEvent, AnthropicStreamMessage, AnthropicUsage,
};
use crate::types::{CanonicalResponse, ClientProtocol, Role};

/// No-op event sent while the client is idle
pub const HEARTBEAT: &[u8] = b"event: ping\ndata: {\"type\":\"ping\"}\n\n";

/// Render `response` as Messages API stream events
///
/// Order: `message_start`, the text block (start, deltas, stop), one
/// start/delta/stop triple per tool call, `message_delta`, `message_stop`.
/// The text block is always present so clients see a stable first index.
pub fn frames(response: &CanonicalResponse, chunk_chars: usize) -> Vec<Bytes> {
    let message = &response.message;
    let mut events = Vec::with_capacity(3 * message.tool_calls.len() + message.content.len() / chunk_chars.max(1) + 6);

    events.push(AnthropicStreamEvent::MessageStart {
        message: AnthropicStreamMessage {
            id: ids::response_for(ClientProtocol::Anthropic, &response.id),
            message_type: "message".to_owned(),
            role: Role::Assistant.as_str().to_owned(),
            content: Vec::new(),
            model: response.model.clone(),
            stop_reason: None,
            stop_sequence: None,
            usage: AnthropicUsage {
                input_tokens: response.usage.prompt_tokens,
                output_tokens: 0,
            },
        },
    });

    events.push(AnthropicStreamEvent::ContentBlockStart {
        index: 0,
        content_block: AnthropicStreamContentBlock::Text { text: String::new() },
    });

    let mut pieces = text_chunks(&message.content, chunk_chars);
    if pieces.is_empty() {
        pieces.push("");
    }
    events.extend(pieces.into_iter().map(|text| AnthropicStreamEvent::ContentBlockDelta {
        index: 0,
        delta: AnthropicStreamDelta::TextDelta { text: text.to_owned() },
    }));

    events.push(AnthropicStreamEvent::ContentBlockStop { index: 0 });

    for (index, call) in (1u32..).zip(&message.tool_calls) {
        events.push(AnthropicStreamEvent::ContentBlockStart {
            index,
            content_block: AnthropicStreamContentBlock::ToolUse {
                id: ids::tool_for(ClientProtocol::Anthropic, &call.id),
                name: call.function_name.clone(),
                input: json!({}),
            },
        });
        events.push(AnthropicStreamEvent::ContentBlockDelta {
            index,
            delta: AnthropicStreamDelta::InputJsonDelta {
                partial_json: call.arguments.to_json().into_owned(),
            },
        });
        events.push(AnthropicStreamEvent::ContentBlockStop { index });
    }

    events.push(AnthropicStreamEvent::MessageDelta {
        delta: AnthropicMessageDelta {
            stop_reason: Some(response.finish_reason.anthropic().to_owned()),
            stop_sequence: None,
        },
        usage: AnthropicDeltaUsage {
            output_tokens: response.usage.completion_tokens,
        },
    });

    events.push(AnthropicStreamEvent::MessageStop);

    events.iter().filter_map(frame).collect()
}

fn frame(event: &AnthropicStreamEvent) -> Option<Bytes> {
    let data = encode(event)?;
    Some(Bytes::from(format!("event: {}\ndata: {data}\n\n", event.event_name())))
}
