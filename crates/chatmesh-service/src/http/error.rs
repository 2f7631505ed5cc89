//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use chatmesh_types::error::DomainError;

use super::response::ApiResponse;

/// Wraps a [`DomainError`] so it can be returned directly from axum handlers.
#[derive(Debug)]
pub struct AppError(pub DomainError);

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            DomainError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "TRANSIENT"),
            DomainError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            DomainError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            DomainError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            DomainError::Fatal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        // `ApiResponse`'s own `IntoResponse` impl (`response.rs`) derives the
        // status from the error code string; only a few of the codes above
        // (NOT_FOUND, CONFLICT, VALIDATION_ERROR) are recognized there, so
        // build the response directly instead of round-tripping through it.
        let body = ApiResponse::<()>::error(code, &self.0.to_string(), String::new(), 0);
        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        });
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            json,
        )
            .into_response()
    }
}
