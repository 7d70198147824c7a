//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error envelope across all
//! endpoints, mapping the core error taxonomy to HTTP status codes via
//! the stable `kind()` tags.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use retrace_core::error::RetraceError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "invalid_args", "storage").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_args",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }
}

impl From<RetraceError> for ApiError {
    fn from(err: RetraceError) -> Self {
        let status = match &err {
            RetraceError::InvalidArgs(_) => StatusCode::BAD_REQUEST,
            RetraceError::ExtractionEmpty(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RetraceError::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RetraceError::EmbeddingTimeout { .. } | RetraceError::Cancelled => {
                StatusCode::REQUEST_TIMEOUT
            }
            RetraceError::SchemaMismatch { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_args_maps_to_400() {
        let api: ApiError = RetraceError::InvalidArgs("bad k".into()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, "invalid_args");
    }

    #[test]
    fn test_extraction_empty_maps_to_422() {
        let api: ApiError = RetraceError::ExtractionEmpty("u".into()).into();
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.code, "extraction_empty");
    }

    #[test]
    fn test_embedding_unavailable_maps_to_503() {
        let api: ApiError = RetraceError::EmbeddingUnavailable("no model".into()).into();
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_cancelled_maps_to_408() {
        let api: ApiError = RetraceError::Cancelled.into();
        assert_eq!(api.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(api.code, "cancelled");
    }

    #[test]
    fn test_storage_maps_to_500() {
        let api: ApiError = RetraceError::Storage("io".into()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
