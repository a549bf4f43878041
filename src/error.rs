use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::store::StoreError;

/// Domain failure taxonomy. Every handler funnels into this single type;
/// IntoResponse is the one place errors become HTTP.
#[derive(Debug)]
pub enum AppError {
    Validation(Vec<String>),
    DuplicateEmail,
    NotFound(String),
    InvalidCredential,
    AlreadyApproved,
    Unauthorized(String),
    Forbidden(String),
    RateLimited(u64),
    Misconfiguration(String),
    EmailDelivery(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(issues) => write!(f, "Validation failed: {}", issues.join("; ")),
            AppError::DuplicateEmail => write!(f, "Duplicate email"),
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::InvalidCredential => write!(f, "Invalid credential"),
            AppError::AlreadyApproved => write!(f, "User is already approved"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::RateLimited(retry) => write!(f, "Rate limited, retry after {retry}s"),
            AppError::Misconfiguration(msg) => write!(f, "Misconfiguration: {msg}"),
            AppError::EmailDelivery(msg) => write!(f, "Email delivery failed: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(issues) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "Validation failed", "error": issues }),
            ),
            AppError::DuplicateEmail => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "Email is already registered" }),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "message": msg })),
            AppError::InvalidCredential => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": "Invalid password" }),
            ),
            AppError::AlreadyApproved => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "User is already approved" }),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "message": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "message": msg })),
            AppError::RateLimited(retry_after) => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "message": "Too many requests, please try again later.",
                    "error": format!("retry after {retry_after} seconds"),
                }),
            ),
            // The 500 class logs server-side and returns a generic message;
            // internal detail never reaches the client.
            AppError::Misconfiguration(msg) => {
                tracing::error!("Server misconfiguration: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Server misconfiguration" }),
                )
            }
            AppError::EmailDelivery(msg) => {
                tracing::error!("Email delivery failed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Failed to send email" }),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::NotFound => AppError::NotFound("Record not found".to_string()),
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}
