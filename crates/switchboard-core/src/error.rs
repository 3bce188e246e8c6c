use http::StatusCode;
use serde_json::{Value, json};

/// Domain error that renders as an API error response
///
/// The LLM crate implements this for its error enum; handlers pick the
/// [`ErrorEnvelope`] matching the surface the client called.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}

/// JSON error body shape of a client surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorEnvelope {
    /// `{"error": {"message", "type", "code"}}`
    OpenAi,
    /// `{"type": "error", "error": {"type", "message"}}`
    Anthropic,
}

impl ErrorEnvelope {
    /// Error body for `error` in this envelope
    #[must_use]
    pub fn render(self, error: &dyn HttpError) -> Value {
        match self {
            Self::OpenAi => json!({
                "error": {
                    "message": error.client_message(),
                    "type": error.error_type(),
                    "code": Value::Null,
                }
            }),
            Self::Anthropic => json!({
                "type": "error",
                "error": {
                    "type": error.error_type(),
                    "message": error.client_message(),
                }
            }),
        }
    }
}
