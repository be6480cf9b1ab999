//! Error types for BrewNotes
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Each variant carries a stable machine-readable reason (see
/// [`AppError::reason`]) that is returned alongside the human message.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid input (422)
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or no session (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Referenced entity absent (404)
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation (422)
    #[error("{0}")]
    Conflict(String),

    /// Identity provider unreachable or returned malformed data (500)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (500)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// Stable reason string sent to clients and used as a metric label
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Upstream(_) | AppError::HttpClient(_) => "upstream",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_)
            | AppError::HttpClient(_)
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::auth::password::PasswordError> for AppError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

/// Unreadable or ill-typed JSON bodies are client input errors
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Returns true when a sqlx error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Server-side failures are logged and replaced with a generic message
    /// so that storage or provider internals never reach the client.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let reason = self.reason();
        let error_message = match &self {
            AppError::Validation(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Upstream(_) | AppError::HttpClient(_) => {
                tracing::error!(error = %self, "Upstream request failed");
                "Identity provider request failed".to_string()
            }
            AppError::Database(_) => {
                tracing::error!(error = %self, "Database error");
                "Database error".to_string()
            }
            AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Internal error");
                "Internal server error".to_string()
            }
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[reason, "unknown"]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
            "reason": reason,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
