//! Pre-stream API errors
//!
//! Once an SSE stream is open every failure travels as an `error` frame; the
//! variants here cover what can go wrong before that point.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::schema::FieldError;

/// Error body for 400 and 401 responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type ("validation", "unauthorized")
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Field-level errors (validation only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<FieldError>>,
    /// Machine-readable auth codes (unauthorized only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_codes: Option<Vec<String>>,
}

/// Errors returned before streaming begins
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{} validation error(s) in request", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Authentication failed: {}", .0.join(", "))]
    Unauthorized(Vec<String>),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match self {
            ApiError::Validation(errors) => (
                status,
                Json(ErrorResponse {
                    error_type: "validation".to_string(),
                    message,
                    validation_errors: Some(errors),
                    error_codes: None,
                }),
            )
                .into_response(),
            ApiError::Unauthorized(codes) => (
                status,
                Json(ErrorResponse {
                    error_type: "unauthorized".to_string(),
                    message,
                    validation_errors: None,
                    error_codes: Some(codes),
                }),
            )
                .into_response(),
            ApiError::Internal(_) => {
                tracing::error!(error = %message, "Request failed before streaming");
                (status, message).into_response()
            }
        }
    }
}
