//! Error types for the local store.

use booruvault_common::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// IPC error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound { .. } => ErrorCode::NotFound,
            StoreError::Integrity(_) => ErrorCode::IntegrityViolation,
            StoreError::Duplicate(_) => ErrorCode::Duplicate,
            StoreError::InvalidArgument(_) => ErrorCode::InvalidRequest,
            StoreError::Storage(_) | StoreError::Serialization(_) => ErrorCode::DatabaseError,
            StoreError::LockPoisoned => ErrorCode::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
