//! Domain errors

use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Call already dispatched: {0}")]
    AlreadyDispatched(String),

    #[error("Call record not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
