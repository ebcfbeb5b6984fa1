//! API error types with structured JSON responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::InferenceError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::MalformedRequest(detail) => {
                (StatusCode::BAD_REQUEST, "MALFORMED_REQUEST", detail)
            }
            ApiError::InvalidImage(detail) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE", detail),
            ApiError::ShapeMismatch(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "SHAPE_MISMATCH", detail)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ShapeMismatch { .. } => ApiError::ShapeMismatch(err.to_string()),
            InferenceError::InvalidImage(detail) => ApiError::InvalidImage(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::MalformedRequest(err.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("inference task failed: {err}"))
    }
}
