//! Protocol normalization and tool-calling compatibility for switchboard
//!
//! Clients speak either the `OpenAI` chat completions protocol or the
//! Anthropic messages protocol; upstream models answer in whatever shape
//! their backend produces. This crate bridges the two: inbound histories
//! become canonical messages, upstream payloads are normalized by backend
//! kind, tool calls are repaired until structurally valid, and the result is
//! rendered back as JSON or a simulated event stream in the client's format.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod bridge;
pub mod capability;
pub mod error;
#[cfg(feature = "http")]
mod handler;
pub mod normalize;
pub mod protocol;
pub mod recover;
pub mod repair;
pub mod state;
pub mod stream;
pub mod types;
pub mod upstream;
pub mod usage;

pub use capability::{CapabilityEntry, CapabilityRegistry, CapabilitySource};
pub use error::LlmError;
#[cfg(feature = "http")]
pub use handler::llm_router;
pub use state::{ClientRequest, ClientResponse, CompletionBody, LlmState, StreamSettings};
pub use upstream::{CallOptions, HttpUpstream, UpstreamClient};
