use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Errors surfaced by the presence and readiness components.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A write was attempted without a signed-in member.
    #[error("not authenticated")]
    NotAuthenticated,
    /// The caller may not change another member's presence.
    #[error("not allowed to change bock presence of `{member_id}`")]
    NotAllowed {
        /// Member whose presence was targeted.
        member_id: String,
    },
    /// The document store failed; the store error is passed through untouched.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// No signed-in member.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Signed-in member lacks the required capability.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Store unavailable or subscription not live.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotAuthenticated => AppError::Unauthorized(err.to_string()),
            ServiceError::NotAllowed { .. } => AppError::Forbidden(err.to_string()),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
