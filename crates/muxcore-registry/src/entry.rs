//! One registry entry per configured server.

use crate::descriptor::ServerDescriptor;
use crate::health::{BreakerState, Health};
use crate::schema::ToolSchema;
use muxcore_rpc::{RpcSession, SessionState};
use std::collections::HashMap;
use std::sync::Arc;

/// The registry's view of one configured server: its immutable descriptor
/// plus the Connection Manager's latest published state.
///
/// `session` is `None` whenever there is no live session (never connected,
/// reconnecting, or shut down) — the registry never blocks waiting for one
/// to appear.
#[derive(Clone)]
pub struct ServerEntry {
    /// The immutable, configuration-derived descriptor.
    pub descriptor: Arc<ServerDescriptor>,
    /// The current live session, if the Connection Manager has one open.
    pub session: Option<RpcSession>,
    /// The session's lifecycle state as of the last published snapshot.
    ///
    /// Denormalized from `session` rather than queried live: `RpcSession`'s
    /// own state is behind an async lock, and readers of a registry
    /// snapshot must never await to find out whether a server is routable.
    pub session_state: Option<SessionState>,
    /// Tool schemas discovered the last time this server was `ready`,
    /// keyed by local tool name (not qualified).
    pub schemas: Arc<HashMap<String, ToolSchema>>,
    /// Heartbeat/failure bookkeeping.
    pub health: Health,
    /// Circuit breaker state.
    pub breaker: BreakerState,
}

impl ServerEntry {
    /// A freshly created entry for a descriptor with no session yet.
    #[must_use]
    pub fn new(descriptor: ServerDescriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            session: None,
            session_state: None,
            schemas: Arc::new(HashMap::new()),
            health: Health::default(),
            breaker: BreakerState::default(),
        }
    }

    /// Whether this entry can currently accept a routed call: the breaker
    /// is closed and the last published session state is `ready`.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        self.breaker.allows_routing() && self.session_state == Some(SessionState::Ready)
    }
}

impl std::fmt::Debug for ServerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEntry")
            .field("server_id", &self.descriptor.server_id)
            .field("has_session", &self.session.is_some())
            .field("session_state", &self.session_state)
            .field("schema_count", &self.schemas.len())
            .field("breaker", &self.breaker)
            .finish()
    }
}
