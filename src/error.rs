//! HTTP-facing error type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::conversation::ConversationError;
use crate::llm::UpstreamError;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Referenced conversation does not exist.
    #[error("Conversation not found")]
    NotFound,
    /// Conversation identifier already taken.
    #[error("Conversation ID already exists")]
    AlreadyExists,
    /// The model runner call failed.
    #[error("{context}: {source}")]
    Upstream {
        /// What the gateway was doing.
        context: &'static str,
        /// Underlying failure.
        #[source]
        source: UpstreamError,
    },
    /// The multipart upload could not be read.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
    /// The request body was rejected.
    #[error("{0}")]
    BadRequest(String),
    /// Unexpected failure inside the gateway.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Wrap an upstream failure with what the gateway was doing.
    ///
    /// Meant for `map_err`: `.map_err(GatewayError::upstream("Error fetching models"))`.
    #[must_use]
    pub fn upstream(context: &'static str) -> impl FnOnce(UpstreamError) -> Self {
        move |source| Self::Upstream { context, source }
    }

    /// Status code returned to the caller.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::MalformedUpload(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Upstream { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ConversationError> for GatewayError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(_) => Self::NotFound,
            ConversationError::AlreadyExists(_) => Self::AlreadyExists,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable error detail.
    pub detail: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(%status, "{}", self);
        } else {
            tracing::debug!(%status, "{}", self);
        }
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationId;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayError::AlreadyExists.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::MalformedUpload("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Internal("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_detail_is_passed_through() {
        let err = GatewayError::upstream("Error communicating with Ollama")(UpstreamError::Status {
            status: StatusCode::NOT_FOUND,
            detail: "model 'nope' not found".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "Error communicating with Ollama: model runner returned 404 Not Found: model 'nope' not found"
        );
    }

    #[test]
    fn test_store_errors_convert() {
        let id = ConversationId::from("abc");
        assert!(matches!(
            GatewayError::from(ConversationError::NotFound(id.clone())),
            GatewayError::NotFound
        ));
        assert!(matches!(
            GatewayError::from(ConversationError::AlreadyExists(id)),
            GatewayError::AlreadyExists
        ));
    }
}
