// models/src/errors.rs

pub use thiserror::Error;

pub type OpsResult<T> = Result<T, OpsError>;

/// Error taxonomy shared by every component of the operations engine.
///
/// `Validation` and `PreconditionFailed` are user-correctable and carry
/// field-level detail; `Internal` is opaque to callers and logged with
/// context at the point of failure. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum OpsError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("insufficient role for this operation")]
    Forbidden,
    #[error("concurrent update conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl OpsError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        OpsError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        OpsError::Validation {
            field: field.into(),
            message: "is required".to_string(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        OpsError::NotFound(what.into())
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        OpsError::Internal(message.to_string())
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(e: serde_json::Error) -> Self {
        OpsError::Internal(format!("document encoding error: {}", e))
    }
}
