//! Error types for the MuzLoto service
//!
//! Provides unified error handling using thiserror. The cache itself is
//! infallible; these errors come from entity actions and request validation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == App Error Enum ==
/// Unified error type for entity actions and the HTTP API.
#[derive(Error, Debug)]
pub enum AppError {
    /// Record not found in the backend
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The backend rejected or failed the operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("malformed record: {err}"))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the service.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use proptest::prelude::*;

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (AppError::NotFound("city 1".to_string()), StatusCode::NOT_FOUND),
            (AppError::InvalidRequest("bad".to_string()), StatusCode::BAD_REQUEST),
            (AppError::Backend("down".to_string()), StatusCode::BAD_GATEWAY),
            (AppError::Internal("error".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(
                response.status(),
                expected_status,
                "Error should map to correct HTTP status"
            );
        }
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<i32>("not a number").unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Internal(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        // Every error variant renders a JSON body with an "error" string.
        #[test]
        fn prop_error_response_format(error_msg in "[a-zA-Z0-9 _-]{1,100}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let variants = vec![
                AppError::NotFound(error_msg.clone()),
                AppError::InvalidRequest(error_msg.clone()),
                AppError::Backend(error_msg.clone()),
                AppError::Internal(error_msg.clone()),
            ];

            for error in variants {
                let expected = error.to_string();
                let response = error.into_response();

                let content_type = response
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                prop_assert!(content_type.contains("application/json"));

                let bytes = rt.block_on(async {
                    to_bytes(response.into_body(), usize::MAX).await.unwrap()
                });
                let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                prop_assert_eq!(json["error"].as_str(), Some(expected.as_str()));
            }
        }
    }
}
