//! Registry-local error type.

use muxcore_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Failures surfaced by registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No `ServerDescriptor` was ever registered under this id.
    #[error("unknown server `{0}`")]
    UnknownServer(String),
    /// The server is known but has no `ready` session and its breaker is
    /// not `closed`; callers should fail fast rather than wait.
    #[error("server `{0}` is unavailable")]
    ServerUnavailable(String),
    /// The server is known but has no schema registered for this tool name.
    #[error("unknown tool `{tool}` on server `{server}`")]
    UnknownTool {
        /// The server that was queried.
        server: String,
        /// The tool name that had no matching schema.
        tool: String,
    },
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        let kind = match err {
            RegistryError::UnknownServer(_) => ErrorKind::UnknownServer,
            RegistryError::ServerUnavailable(_) => ErrorKind::ServerUnavailable,
            RegistryError::UnknownTool { .. } => ErrorKind::UnknownTool,
        };
        CoreError::new(kind, err.to_string())
    }
}

/// Shorthand result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
