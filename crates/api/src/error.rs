//! HTTP error mapping.
//!
//! One conversion point from pipeline and storage errors to the wire:
//! every failure becomes `{"error": "..."}` with a status that tells the
//! sender whether to fix the payload (4xx) or retry later (5xx).
//! Infrastructure detail stays in the logs, never in the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use cartrescue_recovery::RecoveryError;

/// Errors surfaced by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Recovery pipeline failure; the inner variant picks the status.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Malformed client input on the lead-management surface.
    #[error("{0}")]
    Validation(String),

    /// The addressed lead does not exist.
    #[error("lead not found")]
    NotFound,

    /// Storage failure on the lead-management surface.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Recovery(err) => match err {
                RecoveryError::MissingTransactionId | RecoveryError::UnsupportedPlatform(_) => {
                    StatusCode::BAD_REQUEST
                }
                // Retryable for the sender: our stores are down, the
                // payload is fine.
                RecoveryError::SchedulingUnavailable(_)
                | RecoveryError::FastFlagUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                RecoveryError::LeadInsertFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Recovery(RecoveryError::SchedulingUnavailable(_)) => {
                "verification queue unavailable, retry later".to_string()
            }
            ApiError::Recovery(RecoveryError::FastFlagUnavailable(_)) => {
                "payment status store unavailable, retry later".to_string()
            }
            ApiError::Recovery(RecoveryError::LeadInsertFailed(_)) | ApiError::Database(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
