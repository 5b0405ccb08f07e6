//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use parley_core::error::ParleyError;

/// Message returned for every 500. The real cause is only logged.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "validation_error").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// One failed check of a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Field name, empty for the body itself.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 400 Bad Request - body failed schema checks.
    Validation(Vec<ValidationIssue>),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "bad_request".to_string(),
                    message,
                    details: None,
                },
            ),
            ApiError::Validation(issues) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation_error".to_string(),
                    message: "Request body failed validation".to_string(),
                    details: Some(serde_json::json!({ "issues": issues })),
                },
            ),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal_error".to_string(),
                        message: INTERNAL_ERROR_MESSAGE.to_string(),
                        details: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ParleyError> for ApiError {
    fn from(err: ParleyError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_shape() {
        let resp = ApiError::Validation(vec![ValidationIssue::new(
            "autoScroll",
            "Expected boolean",
        )])
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["details"]["issues"][0]["path"], "autoScroll");
        assert_eq!(json["details"]["issues"][0]["message"], "Expected boolean");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let resp = ApiError::Internal("Store lock poisoned: secret".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(resp).await;
        assert_eq!(json["error"], "internal_error");
        assert_eq!(json["message"], INTERNAL_ERROR_MESSAGE);
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_bad_request() {
        let resp = ApiError::BadRequest("Message and sessionId required".to_string())
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "bad_request");
    }

    #[test]
    fn test_store_failure_is_internal() {
        let err: ApiError = ParleyError::Storage("Store lock poisoned".to_string()).into();
        assert!(matches!(err, ApiError::Internal(ref detail) if detail.contains("poisoned")));
    }
}
