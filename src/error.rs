use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::SchemaViolation;

/// Application error type that can be returned from handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    // Schema errors (stored endpoint is misconfigured)
    #[error("Invalid schema format: {0}")]
    InvalidSchemaFormat(String),

    // Client sent a body the endpoint does not accept
    #[error("Request body does not match request schema")]
    RequestValidationFailed(Vec<SchemaViolation>),

    // Neither the AI path nor the fallback produced valid data
    #[error("Failed to generate response data: {0}")]
    GenerationExhausted(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Cache backend errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(String),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            // 404 Not Found
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "Not found",
                Some(serde_json::Value::String(resource.clone())),
            ),

            // 409 Conflict
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "Conflict",
                Some(serde_json::Value::String(msg.clone())),
            ),

            // 422 Unprocessable Entity
            AppError::InvalidSchemaFormat(msg) => {
                tracing::warn!("Invalid schema format: {}", msg);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Invalid schema format",
                    Some(serde_json::Value::String(msg.clone())),
                )
            }

            // 400 Bad Request
            AppError::RequestValidationFailed(violations) => (
                StatusCode::BAD_REQUEST,
                "Request body does not match request schema",
                serde_json::to_value(violations).ok(),
            ),

            // 500 Internal Server Error
            AppError::GenerationExhausted(msg) => {
                tracing::error!("Generation exhausted: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate response data",
                    None,
                )
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error", None)
            }
            AppError::Cache(msg) => {
                tracing::error!("Cache error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

// Convenient conversions from common error types

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return AppError::Conflict(detail);
        }
        match err {
            sea_orm::DbErr::RecordNotFound(_) => AppError::NotFound("Resource".to_string()),
            sea_orm::DbErr::RecordNotInserted => {
                AppError::Conflict("Record already exists".to_string())
            }
            sea_orm::DbErr::RecordNotUpdated => AppError::NotFound("Resource".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Cache(err.to_string())
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
