//! Artefact Store error types.

use muxcore_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Errors from Artefact Store operations.
#[derive(Debug, Error)]
pub enum ArtefactError {
    /// No artefact with the given id (or an incomplete write) was found.
    #[error("artefact `{0}` not found")]
    NotFound(String),
    /// The underlying database connection or query failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<ArtefactError> for CoreError {
    fn from(err: ArtefactError) -> Self {
        match &err {
            ArtefactError::NotFound(_) => CoreError::new(ErrorKind::NotFound, err.to_string()),
            ArtefactError::Backend(_) => CoreError::internal(err.to_string()),
        }
    }
}

/// Shorthand result alias for Artefact Store operations.
pub type ArtefactResult<T> = Result<T, ArtefactError>;
