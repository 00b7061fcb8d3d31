use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::response::ApiResponse;

/// RepoError
///
/// Failures raised by the storage capability. Every `Repository` call resolves
/// to either its value or one of these; callers never see a raw driver error.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The call did not complete within the configured storage timeout.
    #[error("storage operation '{op}' timed out")]
    Timeout { op: &'static str },

    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("referenced row does not exist")]
    ForeignKeyViolation,
}

impl RepoError {
    /// classify
    ///
    /// Splits constraint violations out of the generic driver error so they can be
    /// reported as client errors instead of 500s.
    pub fn classify(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RepoError::UniqueViolation;
            }
            if db_err.is_foreign_key_violation() {
                return RepoError::ForeignKeyViolation;
            }
        }
        RepoError::Database(err)
    }
}

/// AppError
///
/// The request-level error taxonomy. Each variant maps to exactly one HTTP status
/// and is rendered with the standard `{ success: false, message }` envelope.
/// All of them are terminal for the current request; nothing is retried.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input (400).
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, invalid or expired token (401).
    #[error("{0}")]
    Authentication(String),

    /// Valid identity without the rights for this action (403).
    #[error("{0}")]
    Forbidden(String),

    /// Entity absent or already removed (404).
    #[error("{0}")]
    NotFound(String),

    /// Duplicate username, email or student number (409).
    #[error("{0}")]
    Conflict(String),

    /// A storage call exceeded its time bound (504).
    #[error("{0}")]
    Timeout(String),

    /// Storage or server failure (500). The detail is logged, never sent.
    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::UniqueViolation => AppError::Conflict("Resource already exists".to_string()),
            RepoError::ForeignKeyViolation => {
                AppError::Validation("Referenced record does not exist".to_string())
            }
            RepoError::Timeout { op } => {
                tracing::warn!(op, "storage timeout");
                AppError::Timeout("Storage did not respond in time".to_string())
            }
            RepoError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}
