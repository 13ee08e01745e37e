//! # Error Handling
//!
//! This module defines the error types returned by the survey webhook and how they're
//! converted to HTTP responses. Every handler returns `AppResult<T>`, so whatever goes
//! wrong (bad callback payload, database failure, voice platform outage) ends up as a
//! JSON error body with a matching status code.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different kind of failure
//! - **Data**: Each variant holds a human-readable message
//! - **Pattern matching**: `match` maps each variant to an HTTP status code
//!
//! ### Traits for Error Conversion
//! - **From trait**: Lets the `?` operator turn store/JSON/config errors into `AppError`
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines how errors are formatted as strings

use crate::store::StoreError;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Error types for the application.
///
/// ## Error Categories:
/// - **BadRequest**: The caller sent something we can't use (400)
/// - **Conflict**: The callback doesn't match the stored survey progress (409)
/// - **Persistence**: The participant store failed (500)
/// - **Upstream**: The voice platform could not be reached (502)
/// - **ConfigError**: Configuration problems (500)
/// - **Internal**: Anything else that went wrong on our side (500)
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::BadRequest("Missing callID query parameter".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (blocking pool shutdown, unexpected states, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Request conflicts with the stored state (duplicate or out-of-order callback)
    Conflict(String),

    /// Participant store unreachable or a write failed
    Persistence(String),

    /// Voice platform request failed before any response arrived
    Upstream(String),

    /// Configuration file or environment variable problems
    ConfigError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Machine-readable error type used in the JSON body.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Conflict(_) => "conflict",
            AppError::Persistence(_) => "persistence_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::ConfigError(_) => "config_error",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::Persistence(msg)
            | AppError::Upstream(msg)
            | AppError::ConfigError(msg) => msg,
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## HTTP Status Code Mapping:
/// - BadRequest → 400
/// - Conflict → 409
/// - Internal/Persistence/ConfigError → 500
/// - Upstream → 502
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "bad_request",
///     "message": "Missing previous recording (legId/id) for call abc",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::Persistence(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always caused by the client, so they become 400s.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Store failures keep their category: a stale or duplicate write is a conflict,
/// everything else is a persistence failure surfaced as a 500 with no retry.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(_)
            | StoreError::Conflict { .. }
            | StoreError::DuplicateResponse(_) => {
                AppError::Conflict(err.to_string())
            }
            StoreError::Unavailable(_) | StoreError::Query(_) => {
                AppError::Persistence(err.to_string())
            }
        }
    }
}

/// `web::block` fails only when the blocking thread pool is gone or the closure panicked.
impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
