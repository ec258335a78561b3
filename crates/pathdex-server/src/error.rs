//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::DbError;
use crate::ingest::CycleError;
use pathdex_common::CatalogError;

/// Result type alias for server operations
pub type ServerResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Catalog writer is busy: {0}")]
    Busy(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<CycleError> for AppError {
    fn from(err: CycleError) -> Self {
        match err {
            CycleError::LockTimeout(wait) => {
                AppError::Busy(format!("writer lock not acquired within {wait:?}"))
            }
            CycleError::Invariant(e) => AppError::Catalog(e),
            CycleError::Db(e) => AppError::Db(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Clients get accept/reject status only; detail goes to the logs.
        let (status, error_message) = match self {
            AppError::Db(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            AppError::Catalog(ref e) => {
                tracing::error!("Catalog error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A catalog error occurred".to_string(),
                )
            }
            AppError::Busy(ref message) => {
                tracing::warn!("Rejected request, catalog busy: {}", message);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Catalog is busy, retry later".to_string(),
                )
            }
            AppError::Validation(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
