//! The versioned, copy-on-write snapshot readers observe.

use crate::entry::ServerEntry;
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable point-in-time view of every configured server.
///
/// Readers (the Router) clone an `Arc<RegistrySnapshot>` and never block on
/// a writer; writers (the Connection Manager) build a new snapshot and
/// publish it under a single commit, so readers never observe a partial
/// update (e.g. a server's schemas updated but its breaker state stale).
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    /// Monotonically increasing version, bumped on every publish.
    pub version: u64,
    entries: Arc<HashMap<String, ServerEntry>>,
}

impl RegistrySnapshot {
    /// Look up one server's entry by id.
    #[must_use]
    pub fn get(&self, server_id: &str) -> Option<&ServerEntry> {
        self.entries.get(server_id)
    }

    /// Iterate every configured server's entry.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServerEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of configured servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no configured servers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn with_entries(version: u64, entries: HashMap<String, ServerEntry>) -> Self {
        Self {
            version,
            entries: Arc::new(entries),
        }
    }

    pub(crate) fn entries(&self) -> &HashMap<String, ServerEntry> {
        &self.entries
    }
}

impl std::fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("version", &self.version)
            .field("server_count", &self.entries.len())
            .finish()
    }
}
