use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

/// Message returned for every authorization denial. Denials never reveal
/// which rule failed.
pub const FORBIDDEN_MESSAGE: &str = "You are not authorized to perform this action.";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("unknown permission: {0}")]
    UnknownPermission(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// The uniform authorization denial.
    pub fn forbidden() -> Self {
        Self::Forbidden(FORBIDDEN_MESSAGE.to_string())
    }

    pub fn forbidden_with(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName(name.into())
    }

    pub fn unknown_permission(name: impl Into<String>) -> Self {
        Self::UnknownPermission(name.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, AppError::Forbidden(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    /// True when sqlx reports a UNIQUE constraint violation.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => db.is_unique_violation(),
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DuplicateName(_) => StatusCode::CONFLICT,
            AppError::UnknownPermission(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        let error = match &self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::DuplicateName(_) => "duplicate_name",
            AppError::UnknownPermission(_) => "unknown_permission",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::Validation(_) => "validation",
            AppError::Configuration(_) => "configuration",
            AppError::Database(_) => "database",
            AppError::Migration(_) => "migration",
            AppError::Internal(_) => "internal",
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_maps_to_403_with_uniform_message() {
        let err = AppError::forbidden();
        assert_eq!(err.to_string(), FORBIDDEN_MESSAGE);
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn lifecycle_and_registry_errors_map_to_client_statuses() {
        assert_eq!(AppError::not_found("joke").into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("vote").into_response().status(), StatusCode::CONFLICT);
        assert_eq!(AppError::duplicate_name("staff").into_response().status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::unknown_permission("fly").into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
