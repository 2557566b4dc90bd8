//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::CircuitBreakerError;
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Circuit breaker is open; the operation was not attempted.
    Unavailable(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        DomainError::Store(_) | DomainError::Saga(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<CircuitBreakerError<DomainError>> for ApiError {
    fn from(err: CircuitBreakerError<DomainError>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen => {
                ApiError::Unavailable("Service temporarily unavailable".to_string())
            }
            CircuitBreakerError::Operation(inner) => ApiError::Domain(inner),
        }
    }
}
