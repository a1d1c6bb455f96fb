//! Run Store error types.

use muxcore_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Errors from Run Store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested run, step, or approval does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The run is already in a terminal status and cannot be mutated.
    #[error("run `{0}` is already terminal")]
    AlreadyTerminal(String),
    /// The requested status transition is not in the allowed graph.
    #[error("run `{run_id}` cannot transition from `{from}` to `{to}`")]
    InvalidTransition {
        /// The run being transitioned.
        run_id: String,
        /// Its current status.
        from: String,
        /// The rejected target status.
        to: String,
    },
    /// An append targeted an `ordinal` that is not the run's next one.
    #[error("run `{run_id}` expected ordinal {expected}, got {got}")]
    OrdinalConflict {
        /// The run being appended to.
        run_id: String,
        /// The ordinal the store expected next.
        expected: u64,
        /// The ordinal the caller supplied.
        got: u64,
    },
    /// The approval has already been resolved.
    #[error("approval `{0}` has already been resolved")]
    AlreadyResolved(String),
    /// The underlying database connection or query failed.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A persisted record failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::AlreadyTerminal(_) => ErrorKind::AlreadyTerminal,
            StoreError::AlreadyResolved(_) => ErrorKind::AlreadyResolved,
            StoreError::InvalidTransition { .. } | StoreError::OrdinalConflict { .. } => ErrorKind::Internal,
            StoreError::Backend(_) | StoreError::Serialization(_) => ErrorKind::Internal,
        };
        if kind == ErrorKind::Internal {
            CoreError::internal(err.to_string())
        } else {
            CoreError::new(kind, err.to_string())
        }
    }
}

/// Shorthand result alias for Run Store operations.
pub type StoreResult<T> = Result<T, StoreError>;
