//! Errors raised by the executor crate's own public surface (starting and
//! supervising runs). Failures encountered *inside* a run's step loop are
//! not propagated through this type - a step failure is data the loop
//! persists and reacts to, not a Rust error; see [`crate::worker`].

use thiserror::Error;

/// Failures starting or supervising a run.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The durable store rejected the operation.
    #[error("store error: {0}")]
    Store(#[from] muxcore_store::StoreError),
    /// No worker is currently supervising the given run.
    #[error("run {0} is not currently supervised")]
    NotSupervised(muxcore_core::RunId),
    /// A run was submitted while one with the same id was already running.
    #[error("run {0} is already supervised")]
    AlreadySupervised(muxcore_core::RunId),
}

impl From<ExecutorError> for muxcore_core::CoreError {
    fn from(err: ExecutorError) -> Self {
        use muxcore_core::ErrorKind;
        match err {
            ExecutorError::Store(e) => e.into(),
            ExecutorError::NotSupervised(id) => {
                muxcore_core::CoreError::new(ErrorKind::NotFound, format!("run {id} is not currently supervised"))
            },
            ExecutorError::AlreadySupervised(id) => {
                muxcore_core::CoreError::new(ErrorKind::AlreadyTerminal, format!("run {id} is already supervised"))
            },
        }
    }
}

/// The result type for the executor crate's public operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;
