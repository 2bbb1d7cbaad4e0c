//! Application error type and its HTTP mapping.
//!
//! Every handler returns [`AppResult`]; the [`actix_web::ResponseError`]
//! impl turns an error into the `{"error": ...}` body the frontend expects.

use actix_web::{HttpResponse, http::StatusCode};
use jsonwebtoken::errors::ErrorKind;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    /// Request carried no bearer token.
    #[error("Access token required")]
    MissingToken,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    /// Body, query or path could not be parsed into the expected shape.
    #[error("Validation failed")]
    Malformed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests from this IP, please try again later.")]
    RateLimited { retry_after: u64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingToken | AppError::Unauthorized(_) | AppError::Jwt(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::BadRequest(_) | AppError::Validation(_) | AppError::Malformed(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let body = match self {
            AppError::Validation(errors) => json!({
                "error": "Validation failed",
                "details": errors,
            }),
            AppError::Malformed(msg) => json!({
                "error": "Validation failed",
                "details": [{ "msg": msg }],
            }),
            AppError::RateLimited { retry_after } => {
                return HttpResponse::build(status)
                    .insert_header(("Retry-After", retry_after.to_string()))
                    .json(json!({ "error": self.to_string(), "retryAfter": retry_after }));
            }
            AppError::Jwt(e) => {
                tracing::warn!(error = %e, "Rejected session token");
                let msg = match e.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    _ => "Invalid token",
                };
                json!({ "error": msg })
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                json!({ "error": "Internal server error" })
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        HttpResponse::build(status).json(body)
    }
}

/// Maps actix JSON/query/path extraction failures onto the validation shape.
pub fn extractor_error(err: impl std::fmt::Display) -> actix_web::Error {
    AppError::Malformed(err.to_string()).into()
}
