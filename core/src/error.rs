//! Closed error taxonomy shared by every component in this crate.
//!
//! The kinds mirror the propagation policy from the design: `Transient` and
//! `Timeout` are retried by the executor when the failing step is
//! idempotent, everything else terminates the plan.

use serde::{Deserialize, Serialize};

/// The normalized error code returned to API clients regardless of where
/// the failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Validation,
    NotFound,
    Blocked,
    Timeout,
    Transient,
    Permanent,
    Cancelled,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Blocked => "BLOCKED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Transient => "PROCESSING_ERROR",
            ErrorCode::Permanent => "PROCESSING_ERROR",
            ErrorCode::Cancelled => "PROCESSING_ERROR",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether a step carrying this error may be retried when idempotent.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorCode::Timeout | ErrorCode::Transient)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("blocked by aurora: {0}")]
    Blocked(String),

    #[error("deadline exceeded after {0}ms")]
    Timeout(u64),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl OperatorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OperatorError::Validation(_) => ErrorCode::Validation,
            OperatorError::NotFound(_) => ErrorCode::NotFound,
            OperatorError::Blocked(_) => ErrorCode::Blocked,
            OperatorError::Timeout(_) => ErrorCode::Timeout,
            OperatorError::Transient(_) => ErrorCode::Transient,
            OperatorError::Permanent(_) => ErrorCode::Permanent,
            OperatorError::Cancelled => ErrorCode::Cancelled,
            OperatorError::Internal(_) => ErrorCode::Internal,
            OperatorError::Conflict(_) => ErrorCode::Validation,
        }
    }

    /// Human-readable message suitable for surfacing to API clients.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for OperatorError {
    fn from(err: std::io::Error) -> Self {
        OperatorError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
