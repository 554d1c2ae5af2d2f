//! Error types for the rdb-engine service layer.

use rdb_core::OwnerId;

use crate::lifecycle::LifecycleState;

/// Engine error type that wraps errors from the backend crates.
///
/// Only structural failures surface here. Per-file filesystem failures are
/// logged and reported in the operation's report instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cannot {operation} while the result database is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("Owner not found: {0}")]
    OwnerNotFound(OwnerId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rdb-engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<rdb_manifest::ManifestError> for EngineError {
    fn from(err: rdb_manifest::ManifestError) -> Self {
        EngineError::Manifest(err.to_string())
    }
}

impl From<rdb_store::StoreError> for EngineError {
    fn from(err: rdb_store::StoreError) -> Self {
        EngineError::Store(err.to_string())
    }
}

impl From<rdb_core::CoreError> for EngineError {
    fn from(err: rdb_core::CoreError) -> Self {
        EngineError::InvalidInput(err.to_string())
    }
}
