//! Error types for the pixel map server.
//!
//! Request handling and the real-time engine share one error enum. Request
//! handlers surface it to the caller as a status code plus a JSON body; the
//! persistence worker only ever logs it.
//!
//! # Error Categories
//!
//! | Category | Variants | HTTP |
//! |----------|----------|------|
//! | Validation | `Validation` | 400 |
//! | Authentication | `Auth` | 401 |
//! | Authorization | `Forbidden` | 403 |
//! | Lookup | `NotFound` | 404 |
//! | Conflict | `Conflict` | 409 |
//! | Storage | `Persistence`, `Io`, `Json` | 500 |
//! | Configuration | `Config` | 500 |
//!
//! # Examples
//!
//! ```
//! use pixelwar::PixelError;
//!
//! let err = PixelError::Conflict("Name or Tag taken".into());
//! assert_eq!(err.status(), 409);
//! assert!(err.to_string().contains("taken"));
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::io;
use thiserror::Error;

/// Result type for pixel map operations.
pub type Result<T> = std::result::Result<T, PixelError>;

/// Errors raised by request handlers, the durable store and configuration.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PixelError {
    /// A required field was missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Signature verification failed or was impossible.
    #[error("{0}")]
    Auth(String),

    /// Duplicate name/tag/color, or the wallet is already in an alliance.
    #[error("{0}")]
    Conflict(String),

    /// Referenced alliance, user or member does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The caller is authenticated but not allowed to perform the action
    /// (non-leader kick, self-kick).
    #[error("{0}")]
    Forbidden(String),

    /// The durable store rejected or could not perform an operation.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid server configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for PixelError {
    fn from(err: rusqlite::Error) -> Self {
        PixelError::Persistence(err.to_string())
    }
}

/// Unreadable request bodies are rendered like any other `Validation` error.
impl From<JsonRejection> for PixelError {
    fn from(rejection: JsonRejection) -> Self {
        PixelError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for PixelError {
    fn from(rejection: QueryRejection) -> Self {
        PixelError::Validation(rejection.body_text())
    }
}

impl PixelError {
    /// HTTP status code for this error.
    #[inline]
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            PixelError::Validation(_) => 400,
            PixelError::Auth(_) => 401,
            PixelError::Forbidden(_) => 403,
            PixelError::NotFound(_) => 404,
            PixelError::Conflict(_) => 409,
            PixelError::Persistence(_)
            | PixelError::Config(_)
            | PixelError::Io(_)
            | PixelError::Json(_) => 500,
        }
    }

    /// Whether the error was caused by the client request rather than the server.
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        self.status() < 500
    }
}

impl IntoResponse for PixelError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        // Internal details stay in the log.
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
