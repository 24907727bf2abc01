//! Recovery error types.

use crate::classifier::ErrorKind;
use crate::failure::RawFailure;
use thiserror::Error;

/// Error surfaced to callers of [`crate::RetryDriver::run`] and to config loaders.
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// The failure cannot be recovered by reauthorization; the operation is abandoned.
    #[error("Unrecoverable {kind:?} failure: {message}")]
    Unrecoverable {
        kind: ErrorKind,
        message: String,
        failure: RawFailure,
    },

    /// The coordinator owning the auth gate went away while a caller was waiting.
    #[error("Auth gate closed")]
    GateClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecoveryError {
    /// Returns the classified failure for unrecoverable errors.
    pub fn failure(&self) -> Option<&RawFailure> {
        match self {
            RecoveryError::Unrecoverable { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Returns true if the error came from a classified remote failure.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, RecoveryError::Unrecoverable { .. })
    }
}

/// Result type alias using RecoveryError.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// Error a diagnostic sink may report. Always swallowed by the classifier.
#[derive(Error, Debug)]
pub enum DiagnosticError {
    #[error("Diagnostic sink unavailable: {0}")]
    Unavailable(String),

    #[error("Diagnostic serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
