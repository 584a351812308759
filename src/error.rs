//! Error handling module
//!
//! Every failure leaves a handler as `{"error": "<message>"}`. Reads map to
//! 500, writes (and unreadable request bodies) map to 400.

use crate::store::StoreError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Listing entries failed
    #[error("{0}")]
    Read(StoreError),

    /// Create, update or delete failed
    #[error("{0}")]
    Write(StoreError),

    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Read(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Write(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Read(e) => {
                error!(upstream_status = ?e.upstream_status(), "Data store read failed: {:?}", e)
            }
            AppError::Write(e) => {
                error!(upstream_status = ?e.upstream_status(), "Data store write failed: {:?}", e)
            }
            AppError::BadRequest(msg) => warn!("Rejected request body: {}", msg),
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// `Json` extractor whose rejections render as `AppError`
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn api(message: &str) -> StoreError {
        StoreError::Api {
            status: 503,
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_read_failure_is_500() {
        let (status, body) = render(AppError::Read(api("connection refused"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "connection refused"}));
    }

    #[tokio::test]
    async fn test_write_failure_is_400_regardless_of_cause() {
        let (status, body) = render(AppError::Write(api("connection refused"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "connection refused"}));

        let conflict = StoreError::Conflict("duplicate key".to_string());
        let (status, body) = render(AppError::Write(conflict)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "duplicate key");
    }

    #[tokio::test]
    async fn test_bad_request_body() {
        let (status, body) = render(AppError::BadRequest("EOF while parsing".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "EOF while parsing"}));
    }
}
