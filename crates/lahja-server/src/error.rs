//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::GATEWAY_TIMEOUT,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "type": match self.status {
                    StatusCode::BAD_REQUEST => "invalid_request_error",
                    StatusCode::NOT_FOUND => "not_found_error",
                    StatusCode::SERVICE_UNAVAILABLE => "model_unavailable_error",
                    StatusCode::GATEWAY_TIMEOUT => "timeout_error",
                    _ => "server_error",
                },
                "code": self.status.as_str()
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<lahja_core::Error> for ApiError {
    fn from(err: lahja_core::Error) -> Self {
        match &err {
            lahja_core::Error::Validation(_) => ApiError::bad_request(err.to_string()),
            lahja_core::Error::ReferenceNotFound(_) => ApiError::not_found(err.to_string()),
            // Retryable: the failure is not cached, a later request may load.
            lahja_core::Error::Load { .. } => ApiError::unavailable(err.to_string()),
            // Model-side detail stays in the log, clients get an opaque reply.
            lahja_core::Error::Synthesis(detail) => {
                error!("Synthesis failed: {}", detail);
                ApiError::internal("Speech synthesis failed")
            }
            _ => ApiError::internal(err.to_string()),
        }
    }
}
