//! Admission Interface error taxonomy, per spec §4.10/§7's "State errors"
//! category.

use muxcore_executor::ExecutorError;
use muxcore_store::StoreError;
use thiserror::Error;

/// A failure from one of the five Admission Interface operations.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// `start_run` refused to admit the request (empty plan, invalid
    /// budgets, or an allowlist entry that doesn't parse).
    #[error("run rejected: {0}")]
    Rejected(String),
    /// No run, approval, or step exists with the given id.
    #[error("not found: {0}")]
    NotFound(String),
    /// The run targeted by `cancel_run` is already in a terminal status.
    #[error("run `{0}` is already terminal")]
    AlreadyTerminal(String),
    /// The approval targeted by `resolve_approval` was already decided.
    #[error("approval `{0}` has already been resolved")]
    AlreadyResolved(String),
    /// A storage or invariant failure with no external cause.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AdmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::AlreadyTerminal(id) => Self::AlreadyTerminal(id),
            StoreError::AlreadyResolved(id) => Self::AlreadyResolved(id),
            StoreError::InvalidTransition { .. } | StoreError::OrdinalConflict { .. } | StoreError::Backend(_) | StoreError::Serialization(_) => {
                Self::Internal(err.to_string())
            },
        }
    }
}

impl From<ExecutorError> for AdmissionError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Store(e) => e.into(),
            ExecutorError::NotSupervised(id) => Self::NotFound(format!("run {id} is not currently supervised")),
            ExecutorError::AlreadySupervised(id) => Self::AlreadyTerminal(format!("run {id} is already supervised")),
        }
    }
}

/// Shorthand result alias for Admission Interface operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;
