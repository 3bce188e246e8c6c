//! Prompted tool calling for models without native tool support
//!
//! Tool definitions go into the system prompt along with the reply format the
//! text-call normalizer understands. Earlier calls and results in the history
//! are written out in that same format so the transcript stays consistent.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde_json::{Value, json};

use crate::bridge::ids;
use crate::types::{CanonicalMessage, Role, ToolCall, ToolChoice, ToolDefinition};

/// Rewrite `messages` so a text-only model can call `tools`
pub fn render(
    messages: &[CanonicalMessage],
    tools: &[ToolDefinition],
    choice: Option<&ToolChoice>,
) -> Vec<CanonicalMessage> {
    let mut pending = Some(preamble(tools, choice));
    let mut names: HashMap<&str, &str> = HashMap::new();
    let mut rendered = Vec::with_capacity(messages.len() + 1);

    if !messages.iter().any(|message| message.role == Role::System) {
        rendered.extend(pending.take().map(CanonicalMessage::system));
    }

    for message in messages {
        match message.role {
            Role::System => {
                let mut content = message.content.clone();
                if let Some(preamble) = pending.take() {
                    content.push_str("\n\n");
                    content.push_str(&preamble);
                }
                rendered.push(CanonicalMessage::system(content));
            }
            Role::Assistant if message.has_tool_calls() => {
                for call in &message.tool_calls {
                    names.insert(&call.id, &call.function_name);
                }
                rendered.push(CanonicalMessage::assistant(assistant_text(message)));
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().unwrap_or_default();
                let name = names.get(id).copied().unwrap_or("tool");
                rendered.push(CanonicalMessage::user(format!(
                    "<function_results>\n{}\n</function_results>",
                    json!({"name": name, "tool_call_id": ids::tool_text(id), "content": message.content})
                )));
            }
            Role::User | Role::Assistant => rendered.push(message.clone()),
        }
    }

    rendered
}

fn preamble(tools: &[ToolDefinition], choice: Option<&ToolChoice>) -> String {
    let catalog: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description.as_deref().unwrap_or_default(),
                "parameters": tool.parameters,
            })
        })
        .collect();

    let mut text = String::from("You can call the following tools:\n");
    let _ = writeln!(text, "{}", Value::Array(catalog));
    text.push_str(
        "\nTo call tools, reply with only a JSON array of calls wrapped in tags:\n\
         <function_calls>[{\"name\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}]</function_calls>\n\
         Results come back in <function_results> tags.",
    );

    match choice {
        Some(ToolChoice::Required) => text.push_str(" You must call at least one tool."),
        Some(ToolChoice::Function(name)) => {
            let _ = write!(text, " You must call the `{name}` tool.");
        }
        Some(ToolChoice::None) => text.push_str(" Do not call any tool for this reply."),
        Some(ToolChoice::Auto) | None => text.push_str(" If no tool is needed, answer normally."),
    }

    text
}

fn assistant_text(message: &CanonicalMessage) -> String {
    let calls: Vec<Value> = message.tool_calls.iter().map(call_json).collect();
    let block = format!("<function_calls>{}</function_calls>", Value::Array(calls));

    if message.content.is_empty() {
        block
    } else {
        format!("{}\n{block}", message.content)
    }
}

fn call_json(call: &ToolCall) -> Value {
    json!({"name": call.function_name, "arguments": call.arguments.to_value()})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::extract_calls;
    use crate::types::ToolArguments;

    fn tools() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "weather".to_owned(),
            description: Some("Current weather".to_owned()),
            parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        }]
    }

    #[test]
    fn preamble_is_added_as_system_prompt() {
        let rendered = render(&[CanonicalMessage::user("hi")], &tools(), None);

        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].role, Role::System);
        assert!(rendered[0].content.contains("\"weather\""));
        assert!(rendered[0].content.contains("<function_calls>"));
    }

    #[test]
    fn preamble_extends_existing_system_prompt() {
        let rendered = render(
            &[CanonicalMessage::system("Be brief."), CanonicalMessage::user("hi")],
            &tools(),
            Some(&ToolChoice::Required),
        );

        assert_eq!(rendered.len(), 2);
        assert!(rendered[0].content.starts_with("Be brief.\n\n"));
        assert!(rendered[0].content.contains("must call at least one tool"));
    }

    #[test]
    fn history_calls_are_written_in_the_reply_format() {
        let history = [
            CanonicalMessage::user("weather in Oslo?"),
            CanonicalMessage::assistant_tool_calls(vec![ToolCall::new(
                "c1",
                "weather",
                ToolArguments::Encoded(r#"{"city":"Oslo"}"#.to_owned()),
            )]),
            CanonicalMessage::tool_result("c1", "rain"),
        ];

        let rendered = render(&history, &tools(), None);
        let assistant = &rendered[2];

        assert!(!assistant.has_tool_calls());
        let calls = extract_calls(&assistant.content, &[]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function_name, "weather");

        assert_eq!(rendered[3].role, Role::User);
        assert!(rendered[3].content.contains(r#""name":"weather""#));
        assert!(rendered[3].content.contains("rain"));
    }
}
