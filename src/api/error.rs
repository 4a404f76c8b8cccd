use crate::relay::SubmitError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Same body for every decryption failure cause
    #[error("Unable to process submission")]
    Undecryptable,

    #[error("Submission queue unavailable")]
    QueueUnavailable,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Undecryptable(_) => ApiError::Undecryptable,
            SubmitError::Queue(_) => ApiError::QueueUnavailable,
            SubmitError::Seal(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match self {
            ApiError::InvalidRequest(e) => (StatusCode::BAD_REQUEST, e, "INVALID_REQUEST"),
            ApiError::Undecryptable => (
                StatusCode::BAD_REQUEST,
                "Unable to process submission".to_string(),
                "INVALID_SUBMISSION",
            ),
            ApiError::QueueUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable, please retry".to_string(),
                "QUEUE_UNAVAILABLE",
            ),
            // Detail goes to the log only
            ApiError::InternalError(e) => {
                tracing::error!("Internal error handling submission: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": error_code,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
