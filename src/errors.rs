use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::observability::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by JSON endpoints.
///
/// Form endpoints (`/contact`, `/devis`) and the newsletter endpoint use
/// their own response shapes and do not go through this type.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Missing required fields",
    "request_id": "req-abc123xyz"
}))]
pub struct ErrorResponse {
    /// Human-readable error description
    #[schema(example = "Missing required fields")]
    pub error: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
}

/// Closed error taxonomy for the whole service.
///
/// Every failure a handler can produce is one of these four kinds; the
/// HTTP status and the client-visible message are derived from the kind,
/// never from raw upstream error text.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{service} integration error: {detail}")]
    Integration {
        service: &'static str,
        detail: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Wraps a downstream failure, tagged with the upstream service name
    /// (`"commerce"`, `"payment"`, `"scheduling"`, `"forms"`, `"mailing"`).
    pub fn integration(service: &'static str, detail: impl Into<String>) -> Self {
        ServiceError::Integration {
            service,
            detail: detail.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) | Self::Integration { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Server-side failures return generic messages; upstream error text is
    /// logged but never forwarded to the caller.
    pub fn response_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Configuration(_) => "Server configuration error".to_string(),
            Self::Integration { service, .. } => {
                format!("Upstream service error: {}", service)
            }
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: self.response_message(),
            request_id: current_request_id(),
        };

        (status, Json(err)).into_response()
    }
}
