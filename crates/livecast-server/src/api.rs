//! Shared API error type for the Livecast server.

use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use livecast_store::StoreError;
use livecast_voice::VoiceError;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "coordination store unavailable");
                ApiError::ServiceUnavailable("coordination store unavailable".to_string())
            }
            StoreError::Database(e) => {
                tracing::error!(error = %e, "store query failed");
                ApiError::InternalServerError("store query failed".to_string())
            }
        }
    }
}

impl From<VoiceError> for ApiError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::NoCredentialsAvailable => ApiError::ServiceUnavailable(
                "no upstream credentials available; rotate in fresh API keys".to_string(),
            ),
            VoiceError::PersonaNotFound(key) => {
                ApiError::NotFound(format!("persona not found: {key}"))
            }
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}
