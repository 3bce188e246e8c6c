//! Delta-chunk stream for the `OpenAI` surface

use bytes::Bytes;

use super::{encode, text_chunks};
use crate::bridge::{ids, unix_now};
use crate::protocol::openai::{
    OpenAiFunctionCall, OpenAiStreamChoice, OpenAiStreamChunk, OpenAiStreamDelta, OpenAiStreamToolCall, OpenAiUsage,
};
use crate::types::{CanonicalResponse, ClientProtocol, Role};

/// SSE comment sent while the client is idle
pub const HEARTBEAT: &[u8] = b": keep-alive\n\n";

/// Stream terminator
pub const DONE: &[u8] = b"data: [DONE]\n\n";

/// Render `response` as `chat.completion.chunk` frames
///
/// Order: a role chunk, text deltas, one chunk per tool call, a chunk with
/// the finish reason (and usage if requested), then `[DONE]`.
pub fn frames(response: &CanonicalResponse, include_usage: bool, chunk_chars: usize) -> Vec<Bytes> {
    let template = ChunkTemplate {
        id: ids::response_for(ClientProtocol::OpenAi, &response.id),
        created: unix_now(),
        model: &response.model,
    };

    let message = &response.message;
    let mut frames = Vec::with_capacity(message.tool_calls.len() + message.content.len() / chunk_chars.max(1) + 4);

    frames.extend(template.frame(
        OpenAiStreamDelta {
            role: Some(Role::Assistant.as_str().to_owned()),
            content: Some(String::new()),
            tool_calls: None,
        },
        None,
        None,
    ));

    for piece in text_chunks(&message.content, chunk_chars) {
        frames.extend(template.frame(
            OpenAiStreamDelta {
                content: Some(piece.to_owned()),
                ..OpenAiStreamDelta::default()
            },
            None,
            None,
        ));
    }

    for (index, call) in (0u32..).zip(&message.tool_calls) {
        frames.extend(template.frame(
            OpenAiStreamDelta {
                tool_calls: Some(vec![OpenAiStreamToolCall {
                    index,
                    id: ids::tool_for(ClientProtocol::OpenAi, &call.id),
                    tool_type: "function".to_owned(),
                    function: OpenAiFunctionCall {
                        name: call.function_name.clone(),
                        arguments: call.arguments.to_json().into_owned(),
                    },
                }]),
                ..OpenAiStreamDelta::default()
            },
            None,
            None,
        ));
    }

    frames.extend(template.frame(
        OpenAiStreamDelta::default(),
        Some(response.finish_reason.openai()),
        include_usage.then(|| response.usage.into()),
    ));

    frames.push(Bytes::from_static(DONE));
    frames
}

/// Fields shared by every chunk of one response
struct ChunkTemplate<'a> {
    id: String,
    created: u64,
    model: &'a str,
}

impl ChunkTemplate<'_> {
    fn frame(
        &self,
        delta: OpenAiStreamDelta,
        finish_reason: Option<&str>,
        usage: Option<OpenAiUsage>,
    ) -> Option<Bytes> {
        let chunk = OpenAiStreamChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created: self.created,
            model: self.model.to_owned(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_owned),
            }],
            usage,
        };

        encode(&chunk).map(|data| Bytes::from(format!("data: {data}\n\n")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::types::{CanonicalMessage, FinishReason, ToolArguments, ToolCall, Usage};

    fn response(message: CanonicalMessage, finish_reason: FinishReason) -> CanonicalResponse {
        CanonicalResponse {
            id: "abc".to_owned(),
            model: "gpt-4o".to_owned(),
            message,
            finish_reason,
            usage: Usage::new(5, 7),
        }
    }

    fn payloads(frames: &[Bytes]) -> Vec<Value> {
        frames[..frames.len() - 1]
            .iter()
            .map(|frame| {
                let text = std::str::from_utf8(frame).unwrap();
                let data = text.strip_prefix("data: ").unwrap().strip_suffix("\n\n").unwrap();
                serde_json::from_str(data).unwrap()
            })
            .collect()
    }

    #[test]
    fn text_reply_is_chunked_between_role_and_finish() {
        let frames = frames(&response(CanonicalMessage::assistant("Hello, world"), FinishReason::Stop), false, 5);
        let chunks = payloads(&frames);

        assert_eq!(frames.last().unwrap().as_ref(), DONE);
        assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");

        let text: String = chunks[1..chunks.len() - 1]
            .iter()
            .map(|chunk| chunk["choices"][0]["delta"]["content"].as_str().unwrap())
            .collect();
        assert_eq!(text, "Hello, world");
        assert_eq!(chunks.len(), 2 + 3);

        let last = chunks.last().unwrap();
        assert_eq!(last["choices"][0]["finish_reason"], "stop");
        assert!(last.get("usage").is_none());
        assert!(chunks.iter().all(|chunk| chunk["id"] == "chatcmpl-abc"));
    }

    #[test]
    fn each_tool_call_gets_one_chunk() {
        let message = CanonicalMessage::assistant_tool_calls(vec![
            ToolCall::new("a", "one", ToolArguments::Encoded("{\"x\":1}".to_owned())),
            ToolCall::new("b", "two", ToolArguments::Encoded("{}".to_owned())),
        ]);
        let chunks = payloads(&frames(&response(message, FinishReason::ToolCalls), true, 64));

        assert_eq!(chunks.len(), 4);
        let first = &chunks[1]["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(first["index"], 0);
        assert_eq!(first["id"], "call_a");
        assert_eq!(first["function"]["arguments"], "{\"x\":1}");
        assert_eq!(chunks[2]["choices"][0]["delta"]["tool_calls"][0]["index"], 1);

        assert_eq!(chunks[3]["choices"][0]["finish_reason"], "tool_calls");
        assert_eq!(chunks[3]["usage"]["completion_tokens"], 7);
    }
}
