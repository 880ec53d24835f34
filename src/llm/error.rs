//! Error type for calls to the model runner.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the model runner.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, DNS or timeout failure before a response was received.
    #[error("model runner unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    /// The model runner answered with a non-success status.
    #[error("model runner returned {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Error detail reported by the model runner.
        detail: String,
    },
    /// The response body could not be read or decoded.
    #[error("invalid model runner response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// HTTP status reported by the model runner, if one was received.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    /// True when the model runner rejected the request shape.
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        self.status() == Some(StatusCode::BAD_REQUEST)
    }

    /// True when the call hit its time bound.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

/// Pick the most useful detail out of an error body.
///
/// Ollama reports failures as `{"error": "..."}`; anything else is passed
/// through verbatim, and an empty body falls back to the status reason.
#[must_use]
pub fn error_detail(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string();
    }

    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| trimmed.to_string())
}
