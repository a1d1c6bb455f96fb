//! The registry itself: a versioned handle writers publish to and readers
//! observe without blocking.

use crate::descriptor::ServerDescriptor;
use crate::entry::ServerEntry;
use crate::error::{RegistryError, RegistryResult};
use crate::health::BreakerState;
use crate::schema::ToolSchema;
use crate::snapshot::RegistrySnapshot;
use muxcore_rpc::{RpcSession, SessionState};
use std::collections::HashMap;
use std::sync::RwLock;

/// Server registry and capability cache.
///
/// Holds one record per configured server: its descriptor, current
/// session, discovered schemas, health, and breaker state. Readers call
/// [`Registry::snapshot`] to get a consistent, non-blocking view; writers
/// (the Connection Manager) mutate one server's entry at a time and the
/// registry republishes a new snapshot version under a single commit.
pub struct Registry {
    state: RwLock<RegistrySnapshot>,
}

impl Registry {
    /// Build a registry seeded with one entry per descriptor, all
    /// disconnected and with the breaker closed.
    #[must_use]
    pub fn new(descriptors: Vec<ServerDescriptor>) -> Self {
        let entries = descriptors
            .into_iter()
            .map(|d| (d.server_id.clone(), ServerEntry::new(d)))
            .collect();
        Self {
            state: RwLock::new(RegistrySnapshot::with_entries(0, entries)),
        }
    }

    /// Take a consistent, non-blocking snapshot of the whole registry.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.state.read().expect("registry lock poisoned").clone()
    }

    /// Look up one server's descriptor, failing if it was never configured.
    pub fn descriptor(&self, server_id: &str) -> RegistryResult<std::sync::Arc<ServerDescriptor>> {
        self.snapshot()
            .get(server_id)
            .map(|e| e.descriptor.clone())
            .ok_or_else(|| RegistryError::UnknownServer(server_id.to_string()))
    }

    /// Whether routing may currently be attempted to this server (breaker
    /// closed and session `ready`). Fails fast with `ServerUnavailable`
    /// rather than waiting on reconnect, per the Connection Manager
    /// contract.
    pub fn require_routable(&self, server_id: &str) -> RegistryResult<RpcSession> {
        let snapshot = self.snapshot();
        let entry = snapshot
            .get(server_id)
            .ok_or_else(|| RegistryError::UnknownServer(server_id.to_string()))?;
        if !entry.is_routable() {
            return Err(RegistryError::ServerUnavailable(server_id.to_string()));
        }
        entry
            .session
            .clone()
            .ok_or_else(|| RegistryError::ServerUnavailable(server_id.to_string()))
    }

    /// Look up a tool's schema, failing with `UnknownTool` if not found
    /// under the current snapshot.
    pub fn tool_schema(&self, server_id: &str, tool_name: &str) -> RegistryResult<ToolSchema> {
        let snapshot = self.snapshot();
        let entry = snapshot
            .get(server_id)
            .ok_or_else(|| RegistryError::UnknownServer(server_id.to_string()))?;
        entry
            .schemas
            .get(tool_name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTool {
                server: server_id.to_string(),
                tool: tool_name.to_string(),
            })
    }

    /// Publish a new session for a server (e.g. after a successful
    /// connect), replacing whatever was there. Clears schemas: discovery
    /// must be re-run and committed via [`Self::commit_discovery`].
    pub fn publish_session(&self, server_id: &str, session: Option<RpcSession>, state: Option<SessionState>) {
        self.mutate(server_id, |entry| {
            entry.session = session;
            entry.session_state = state;
            if state != Some(SessionState::Ready) {
                entry.schemas = std::sync::Arc::new(HashMap::new());
            }
        });
    }

    /// Update only the denormalized session state (e.g. heartbeat flips it
    /// `degraded`... tracked by the Connection Manager, not modeled here as
    /// a distinct `SessionState` variant — callers pass the nearest of the
    /// four session states plus their own health bookkeeping).
    pub fn update_session_state(&self, server_id: &str, state: SessionState) {
        self.mutate(server_id, |entry| entry.session_state = Some(state));
    }

    /// Atomically replace a server's discovered tool schemas under one
    /// commit, per the "single commit" discovery contract.
    pub fn commit_discovery(&self, server_id: &str, schemas: Vec<ToolSchema>) {
        let by_name = schemas.into_iter().map(|s| (s.tool_name.clone(), s)).collect();
        self.mutate(server_id, |entry| {
            entry.schemas = std::sync::Arc::new(by_name);
        });
    }

    /// Record a heartbeat success.
    pub fn record_heartbeat_success(&self, server_id: &str) {
        self.mutate(server_id, |entry| entry.health.record_success());
    }

    /// Record a missed heartbeat interval.
    pub fn record_heartbeat_miss(&self, server_id: &str) {
        self.mutate(server_id, |entry| entry.health.record_miss());
    }

    /// Set the circuit breaker state.
    pub fn set_breaker(&self, server_id: &str, breaker: BreakerState) {
        self.mutate(server_id, |entry| entry.breaker = breaker);
    }

    fn mutate(&self, server_id: &str, f: impl FnOnce(&mut ServerEntry)) {
        let mut guard = self.state.write().expect("registry lock poisoned");
        let mut entries = guard.entries().clone();
        if let Some(entry) = entries.get_mut(server_id) {
            f(entry);
            let next_version = guard.version + 1;
            *guard = RegistrySnapshot::with_entries(next_version, entries);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Registry")
            .field("version", &snapshot.version)
            .field("server_count", &snapshot.len())
            .finish()
    }
}
