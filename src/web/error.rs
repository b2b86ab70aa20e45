use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::monitor::{RegistryError, TargetError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {msg}"),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(sql_err) => sql_err.into(),
            None => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<SqlErr> for AppError {
    fn from(err: SqlErr) -> Self {
        match err {
            // e.g. re-registering the URL of a stored row that failed to load
            SqlErr::UniqueConstraintViolation(msg) => AppError::Conflict(msg),
            other => AppError::DatabaseError(other.to_string()),
        }
    }
}

impl From<TargetError> for AppError {
    fn from(err: TargetError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateUrl(_) => AppError::Conflict(err.to_string()),
            RegistryError::NotFound(_) => AppError::NotFound(err.to_string()),
            RegistryError::Invalid(e) => e.into(),
        }
    }
}
