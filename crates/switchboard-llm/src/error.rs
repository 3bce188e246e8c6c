use http::StatusCode;
use switchboard_config::ProviderKind;
use switchboard_core::HttpError;
use thiserror::Error;

/// Longest upstream error body echoed back to clients
const MAX_ECHOED_BODY: usize = 2048;

/// Errors that can occur while serving a chat request
#[derive(Debug, Error)]
pub enum LlmError {
    /// Upstream provider answered with a non-success status
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Upstream could not be reached or the connection failed
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// Upstream did not answer within its configured timeout
    #[error("upstream timed out: {0}")]
    Timeout(String),

    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The model resolves to a provider kind with no configured upstream
    #[error("no upstream configured for provider '{}' (model '{model}')", provider.as_str())]
    UpstreamNotConfigured { provider: ProviderKind, model: String },

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidRequest(_) | Self::UpstreamNotConfigured { .. } => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Upstream { status, .. } => match *status {
                400 => "invalid_request_error",
                401 => "authentication_error",
                403 => "permission_error",
                404 => "not_found_error",
                429 => "rate_limit_error",
                529 => "overloaded_error",
                _ => "api_error",
            },
            Self::Transport(_) | Self::Timeout(_) => "api_error",
            Self::InvalidRequest(_) | Self::UpstreamNotConfigured { .. } => "invalid_request_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Upstream { status, body } if body.len() > MAX_ECHOED_BODY => {
                let mut end = MAX_ECHOED_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                format!("upstream returned {status}: {}…", &body[..end])
            }
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
