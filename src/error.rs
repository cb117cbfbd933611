#[cfg(feature = "web")]
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Stable, machine-readable error codes returned alongside every error message.
pub mod error_code {
    pub const CONFIG_MISSING: &str = "CONFIG_MISSING";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const REMOTE_ERROR: &str = "REMOTE_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Application-wide error type
///
/// Every fallible operation in the crate returns this error. Each variant maps
/// to one class of failure the user can see:
///
/// * `Config` - a required setting (usually the sheet endpoint) is missing
/// * `Validation` - form input was rejected before anything was mutated
/// * `Remote` - the sheet endpoint or generative-text service failed
///
/// The message is shown to the user verbatim.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Remote(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => error_code::CONFIG_MISSING,
            AppError::Validation(_) => error_code::VALIDATION_FAILED,
            AppError::NotFound(_) => error_code::NOT_FOUND,
            AppError::Conflict(_) => error_code::CONFLICT,
            AppError::Unauthorized(_) => error_code::UNAUTHENTICATED,
            AppError::PermissionDenied(_) => error_code::PERMISSION_DENIED,
            AppError::Remote(_) => error_code::REMOTE_ERROR,
            AppError::Storage(_) => error_code::STORAGE_ERROR,
            AppError::Internal(_) => error_code::INTERNAL,
        }
    }

    #[cfg(feature = "web")]
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::PRECONDITION_FAILED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

#[cfg(feature = "web")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
