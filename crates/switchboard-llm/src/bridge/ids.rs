//! Identifier namespaces
//!
//! Canonical ids carry no protocol prefix. Each client surface adds its own
//! prefix on the way out and strips any known prefix on the way in, so an id
//! issued under one surface is recognized when it comes back in a tool result.
//! Client ids that never had a known prefix are marked instead and go back
//! out exactly as they came in.

use crate::repair;
use crate::types::ClientProtocol;

/// Tool call id prefix on the `OpenAI` surface
pub const OPENAI_TOOL_PREFIX: &str = "call_";

/// Tool use id prefix on the Anthropic surface
pub const ANTHROPIC_TOOL_PREFIX: &str = "toolu_";

const TOOL_PREFIXES: &[&str] = &[OPENAI_TOOL_PREFIX, ANTHROPIC_TOOL_PREFIX];

/// Leads a canonical tool id that is shown to clients as is
const VERBATIM: char = '\u{1f}';

/// Completion id prefix on the `OpenAI` surface
pub const OPENAI_RESPONSE_PREFIX: &str = "chatcmpl-";

/// Message id prefix on the Anthropic surface
pub const ANTHROPIC_RESPONSE_PREFIX: &str = "msg_";

const RESPONSE_PREFIXES: &[&str] = &[OPENAI_RESPONSE_PREFIX, ANTHROPIC_RESPONSE_PREFIX];

/// Canonical form of a tool id sent by a client
///
/// A known prefix is stripped. Any other id is marked verbatim.
pub fn tool_to_canonical(id: &str) -> String {
    match strip_known(id, TOOL_PREFIXES) {
        Some(rest) => rest.to_owned(),
        None => format!("{VERBATIM}{id}"),
    }
}

/// Canonical form of a tool id issued by an upstream
pub fn tool_from_upstream(id: &str) -> String {
    strip(id, TOOL_PREFIXES)
}

/// Tool id as presented to a client of `protocol`
///
/// Canonical ids get the protocol's prefix. Verbatim ids lose only their
/// marker. An id that still carries a known prefix is returned unchanged, so
/// one conversation never sees two spellings.
pub fn tool_for(protocol: ClientProtocol, id: &str) -> String {
    if let Some(verbatim) = id.strip_prefix(VERBATIM) {
        return verbatim.to_owned();
    }

    if TOOL_PREFIXES.iter().any(|prefix| id.starts_with(prefix)) {
        return id.to_owned();
    }

    let prefix = match protocol {
        ClientProtocol::OpenAi => OPENAI_TOOL_PREFIX,
        ClientProtocol::Anthropic => ANTHROPIC_TOOL_PREFIX,
    };
    format!("{prefix}{id}")
}

/// Tool id text for prompts, without the verbatim marker
pub fn tool_text(id: &str) -> &str {
    id.strip_prefix(VERBATIM).unwrap_or(id)
}

/// Strip a known response id prefix
pub fn response_to_canonical(id: &str) -> String {
    strip(id, RESPONSE_PREFIXES)
}

/// Response id as presented to a client of `protocol`
pub fn response_for(protocol: ClientProtocol, id: &str) -> String {
    let prefix = match protocol {
        ClientProtocol::OpenAi => OPENAI_RESPONSE_PREFIX,
        ClientProtocol::Anthropic => ANTHROPIC_RESPONSE_PREFIX,
    };
    format!("{prefix}{id}")
}

/// Fresh canonical response id
pub fn new_response_id() -> String {
    repair::generate_id()
}

fn strip(id: &str, prefixes: &[&str]) -> String {
    strip_known(id, prefixes).unwrap_or(id).to_owned()
}

fn strip_known<'a>(id: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes
        .iter()
        .find_map(|prefix| id.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
}
