//! The core error taxonomy (kinds, not incident-specific messages).
//!
//! Every failure surfaced through the Admission Interface carries one of
//! these stable kinds plus a human-readable message, per the error
//! handling design. Individual crates define narrower errors for their own
//! internal use and convert into `CoreError` at their public boundary.

use thiserror::Error;

/// A stable, machine-readable error kind.
///
/// This is the taxonomy from the error handling design: transport,
/// protocol, routing, policy, tool, state, and internal errors. It is
/// intentionally a flat enum rather than nested so that callers can match
/// on `.kind()` without drilling into variant payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The remote could not be reached within the connect deadline.
    TransportUnavailable,
    /// An established transport was severed.
    TransportBroken,
    /// The peer sent something that did not parse as a valid frame.
    ProtocolViolation,
    /// No response arrived before the call's deadline.
    DeadlineExceeded,
    /// The session was closed while the call was pending.
    SessionClosed,
    /// A qualified tool name did not parse as `<server_id>.<tool_name>`.
    BadToolName,
    /// No server is configured with the given id.
    UnknownServer,
    /// The server is configured but its breaker is open or its session is
    /// not `ready`; callers fail fast rather than wait on reconnect.
    ServerUnavailable,
    /// The server does not expose a tool with the given name.
    UnknownTool,
    /// Arguments failed validation against the tool's input schema.
    InvalidArguments,
    /// A policy rule forbade the call before any dispatch was attempted.
    PolicyDenied,
    /// The call would exceed a run or server budget.
    BudgetExceeded,
    /// The call requires an approval that has not been resolved.
    RequiresApproval,
    /// The tool server returned a JSON-RPC error.
    ToolError,
    /// The requested entity does not exist.
    NotFound,
    /// The entity is already in a terminal state.
    AlreadyTerminal,
    /// The approval has already been resolved.
    AlreadyResolved,
    /// A storage, invariant, or recovery failure with no external cause.
    Internal,
}

impl ErrorKind {
    /// Whether an Executor may retry a dispatch failure of this kind.
    ///
    /// Per the Router's idempotency note: only these are the Executor's
    /// responsibility to retry; everything else must surface unchanged.
    #[must_use]
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::TransportBroken | Self::DeadlineExceeded)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TransportUnavailable => "transport_unavailable",
            Self::TransportBroken => "transport_broken",
            Self::ProtocolViolation => "protocol_violation",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::SessionClosed => "session_closed",
            Self::BadToolName => "bad_tool_name",
            Self::UnknownServer => "unknown_server",
            Self::ServerUnavailable => "server_unavailable",
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArguments => "invalid_arguments",
            Self::PolicyDenied => "policy_denied",
            Self::BudgetExceeded => "budget_exceeded",
            Self::RequiresApproval => "requires_approval",
            Self::ToolError => "tool_error",
            Self::NotFound => "not_found",
            Self::AlreadyTerminal => "already_terminal",
            Self::AlreadyResolved => "already_resolved",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// A core error: a stable `kind`, a human-readable message, and optional
/// structured detail for the caller to render.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct CoreError {
    /// The stable kind, matched by callers.
    pub kind: ErrorKind,
    /// A human-readable description, safe to show to an operator.
    pub message: String,
    /// For `InvalidArguments`, a JSON-pointer-like path to the offending
    /// field. `None` for every other kind.
    pub argument_path: Option<String>,
    /// For `Internal`, an incident id correlating with server-side logs.
    pub incident_id: Option<String>,
}

impl CoreError {
    /// Build an error of the given kind with a message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            argument_path: None,
            incident_id: None,
        }
    }

    /// Attach an argument path (for `InvalidArguments`).
    #[must_use]
    pub fn with_argument_path(mut self, path: impl Into<String>) -> Self {
        self.argument_path = Some(path.into());
        self
    }

    /// Attach an incident id (for `Internal`).
    #[must_use]
    pub fn with_incident_id(mut self, id: impl Into<String>) -> Self {
        self.incident_id = Some(id.into());
        self
    }

    /// Build an `Internal` error, generating a fresh incident id.
    ///
    /// Internal errors must never be silently swallowed; constructing one
    /// always stamps an id so it can be correlated with logs.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message).with_incident_id(uuid::Uuid::new_v4().to_string())
    }

    /// Whether an Executor may retry this failure.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }
}

/// The result type threaded through core operations.
pub type CoreResult<T> = Result<T, CoreError>;
