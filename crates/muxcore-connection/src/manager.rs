//! Owns one worker task per `ServerDescriptor` and the registry they publish
//! to.

use crate::config::ConnectionConfig;
use crate::worker;
use muxcore_registry::{Registry, ServerDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Owns session lifecycles for every configured server: connect, discover,
/// heartbeat, reconnect, circuit breaker, and graceful shutdown.
pub struct ConnectionManager {
    registry: Arc<Registry>,
    workers: HashMap<String, WorkerHandle>,
}

impl ConnectionManager {
    /// Start one worker per descriptor, sharing the given registry.
    ///
    /// The registry must already have been seeded with these same
    /// descriptors (typically via `Registry::new(descriptors.clone())`).
    #[must_use]
    pub fn start(registry: Arc<Registry>, descriptors: Vec<ServerDescriptor>, config: ConnectionConfig) -> Self {
        let mut workers = HashMap::new();
        for descriptor in descriptors {
            let server_id = descriptor.server_id.clone();
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let descriptor = Arc::new(descriptor);
            let registry = Arc::clone(&registry);
            let join = tokio::spawn(worker::run(registry, descriptor, config, shutdown_rx));
            workers.insert(server_id, WorkerHandle { shutdown_tx, join });
        }
        Self { registry, workers }
    }

    /// The shared registry every worker publishes into.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Signal every worker to close its session with `grace`, then wait
    /// (up to `grace` plus a small margin) for them all to finish.
    pub async fn drain_and_stop(mut self, grace: Duration) {
        for handle in self.workers.values() {
            let _ = handle.shutdown_tx.send(true);
        }
        let deadline = tokio::time::Instant::now() + grace + Duration::from_secs(2);
        for (server_id, handle) in self.workers.drain() {
            match tokio::time::timeout_at(deadline, handle.join).await {
                Ok(Ok(())) => info!(server = %server_id, "worker stopped"),
                Ok(Err(e)) => tracing::warn!(server = %server_id, error = %e, "worker task panicked"),
                Err(_) => {
                    tracing::warn!(server = %server_id, "worker did not stop within grace period");
                },
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("worker_count", &self.workers.len())
            .finish()
    }
}
