//! Canonical types for the normalization engine
//!
//! Every client protocol and upstream shape converts to and from these.
//! They are request-scoped and never shared between requests.

pub mod message;
pub mod request;
pub mod response;
pub mod tool;

pub use message::{CanonicalMessage, Role, ToolArguments, ToolCall};
pub use request::{CanonicalRequest, ClientProtocol, GenerationParams};
pub use response::{CanonicalResponse, FinishReason, Usage};
pub use tool::{ToolChoice, ToolDefinition};
