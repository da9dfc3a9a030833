use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use gridbook_formula::FormulaError;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Parse and cycle failures from the formula engine; the Display form
    /// carries the error symbol (`#ERROR! ...`, `#CYCLE! ...`).
    #[error("{0}")]
    Formula(#[from] FormulaError),

    /// A cell's stored version moved under the edit; retried by the update
    /// coordinator and only surfaced once the retry budget is spent.
    #[error("Concurrent modification detected. Please retry.")]
    VersionConflict,

    #[error("Request cancelled during shutdown")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Formula(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::VersionConflict => (StatusCode::CONFLICT, self.to_string()),
            AppError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
