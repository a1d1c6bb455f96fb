//! The Router's error taxonomy: each variant maps onto exactly one
//! resolution/validation/policy step, per the short-circuit contract.

use muxcore_core::{CoreError, ErrorKind};
use muxcore_registry::RegistryError;
use muxcore_rpc::RpcError;
use thiserror::Error;

/// A failure from resolving, validating, or dispatching one tool call.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The qualified name did not parse as `<server_id>.<tool_name>`.
    #[error("`{0}` is not a valid qualified tool name")]
    BadToolName(String),
    /// No server is configured with the given id.
    #[error("unknown server `{0}`")]
    UnknownServer(String),
    /// The server has no tool with the given name in its current schema.
    #[error("unknown tool `{tool}` on server `{server}`")]
    UnknownTool {
        /// The server queried.
        server: String,
        /// The tool name that was not found.
        tool: String,
    },
    /// Arguments failed validation against the tool's input schema.
    #[error("invalid arguments at `{pointer}`: {detail}")]
    InvalidArguments {
        /// A JSON-pointer-like path to the first violating field.
        pointer: String,
        /// The validator's description of the violation.
        detail: String,
    },
    /// A policy rule forbade the call before dispatch.
    #[error("denied by policy rule `{rule}`")]
    PolicyDenied {
        /// The name of the rule that triggered.
        rule: String,
    },
    /// The call would exceed a run or server budget.
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),
    /// The tool requires an approval that has not yet been resolved.
    #[error("requires approval")]
    RequiresApproval,
    /// The server is configured but not currently routable.
    #[error("server `{0}` is unavailable")]
    ServerUnavailable(String),
    /// The dispatched call itself failed.
    #[error(transparent)]
    Dispatch(#[from] RpcError),
}

impl From<RegistryError> for RouterError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownServer(id) => Self::UnknownServer(id),
            RegistryError::ServerUnavailable(id) => Self::ServerUnavailable(id),
            RegistryError::UnknownTool { server, tool } => Self::UnknownTool { server, tool },
        }
    }
}

impl RouterError {
    /// Whether the Executor may retry this failure, per the Router's
    /// idempotency note: only transport-level failures are retriable, and
    /// validation/policy failures must surface unchanged.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Dispatch(e) if matches!(
            e,
            RpcError::TransportBroken(_) | RpcError::DeadlineExceeded
        ))
    }
}

impl From<RouterError> for CoreError {
    fn from(err: RouterError) -> Self {
        if let RouterError::Dispatch(rpc_err) = err {
            return CoreError::from(rpc_err);
        }
        let kind = match &err {
            RouterError::BadToolName(_) => ErrorKind::BadToolName,
            RouterError::UnknownServer(_) => ErrorKind::UnknownServer,
            RouterError::UnknownTool { .. } => ErrorKind::UnknownTool,
            RouterError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            RouterError::PolicyDenied { .. } => ErrorKind::PolicyDenied,
            RouterError::BudgetExceeded(_) => ErrorKind::BudgetExceeded,
            RouterError::RequiresApproval => ErrorKind::RequiresApproval,
            RouterError::ServerUnavailable(_) => ErrorKind::ServerUnavailable,
            RouterError::Dispatch(_) => unreachable!("handled above"),
        };
        let argument_path = match &err {
            RouterError::InvalidArguments { pointer, .. } => Some(pointer.clone()),
            _ => None,
        };
        let mut core = CoreError::new(kind, err.to_string());
        if let Some(path) = argument_path {
            core = core.with_argument_path(path);
        }
        core
    }
}

/// Shorthand result alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
