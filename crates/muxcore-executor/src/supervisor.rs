//! Owns one worker task per in-flight run.
//!
//! Grounded directly on `muxcore_connection::manager::ConnectionManager`:
//! one `tokio::spawn`ed task per entity, a `tokio::sync::watch` shutdown
//! signal per task, and a `drain_and_stop` that signals everyone and
//! waits up to a grace period. The one structural difference is that
//! runs are admitted one at a time over the supervisor's lifetime rather
//! than all started up front from a fixed descriptor list, so the worker
//! map lives behind a `tokio::sync::Mutex` and each worker removes its
//! own entry on exit instead of the caller draining a fixed set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use muxcore_artefacts::ArtefactStore;
use muxcore_core::RunId;
use muxcore_events::EventBus;
use muxcore_registry::Registry;
use muxcore_router::Router;
use muxcore_store::RunStore;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::plan::PlanSource;
use crate::worker::{self, WorkerConfig};

struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Starts and supervises one worker task per run admitted to it.
pub struct ExecutorSupervisor {
    store: Arc<RunStore>,
    registry: Arc<Registry>,
    router: Arc<Router>,
    events: Arc<EventBus>,
    artefacts: Arc<ArtefactStore>,
    config: WorkerConfig,
    workers: Arc<Mutex<HashMap<RunId, WorkerHandle>>>,
}

impl ExecutorSupervisor {
    /// Build a supervisor over the shared handles every worker dispatches
    /// through.
    #[must_use]
    pub fn new(
        store: Arc<RunStore>,
        registry: Arc<Registry>,
        router: Arc<Router>,
        events: Arc<EventBus>,
        artefacts: Arc<ArtefactStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            router,
            events,
            artefacts,
            config,
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a worker driving `run_id` against `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::AlreadySupervised`] if a worker for this
    /// run is already running.
    pub async fn start_run(&self, run_id: RunId, plan: Arc<dyn PlanSource>) -> ExecutorResult<()> {
        let mut workers = self.workers.lock().await;
        if workers.contains_key(&run_id) {
            return Err(ExecutorError::AlreadySupervised(run_id));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(Self::run_and_reap(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            Arc::clone(&self.router),
            Arc::clone(&self.events),
            Arc::clone(&self.artefacts),
            plan,
            self.config,
            shutdown_rx,
            run_id,
            Arc::clone(&self.workers),
        ));
        workers.insert(run_id, WorkerHandle { shutdown_tx, join });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_and_reap(
        store: Arc<RunStore>,
        registry: Arc<Registry>,
        router: Arc<Router>,
        events: Arc<EventBus>,
        artefacts: Arc<ArtefactStore>,
        plan: Arc<dyn PlanSource>,
        config: WorkerConfig,
        shutdown_rx: watch::Receiver<bool>,
        run_id: RunId,
        workers: Arc<Mutex<HashMap<RunId, WorkerHandle>>>,
    ) {
        worker::run(run_id, store, registry, router, events, artefacts, plan, config, shutdown_rx).await;
        workers.lock().await.remove(&run_id);
    }

    /// Signal the worker for `run_id` to stop as soon as it next checks
    /// its shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NotSupervised`] if no worker is currently
    /// running this run (it may already have reached a terminal status).
    pub async fn cancel_run(&self, run_id: RunId) -> ExecutorResult<()> {
        let workers = self.workers.lock().await;
        let handle = workers.get(&run_id).ok_or(ExecutorError::NotSupervised(run_id))?;
        let _ = handle.shutdown_tx.send(true);
        Ok(())
    }

    /// Whether a worker is currently supervising `run_id`.
    pub async fn is_supervised(&self, run_id: RunId) -> bool {
        self.workers.lock().await.contains_key(&run_id)
    }

    /// Signal every running worker to stop, then wait (up to `grace` plus
    /// a small margin) for them all to finish.
    pub async fn drain_and_stop(&self, grace: Duration) {
        let mut workers = self.workers.lock().await;
        for handle in workers.values() {
            let _ = handle.shutdown_tx.send(true);
        }
        let deadline = tokio::time::Instant::now() + grace + Duration::from_secs(2);
        for (run_id, handle) in workers.drain() {
            match tokio::time::timeout_at(deadline, handle.join).await {
                Ok(Ok(())) => info!(%run_id, "run worker stopped"),
                Ok(Err(e)) => warn!(%run_id, error = %e, "run worker task panicked"),
                Err(_) => warn!(%run_id, "run worker did not stop within grace period"),
            }
        }
    }
}

impl std::fmt::Debug for ExecutorSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorSupervisor").finish_non_exhaustive()
    }
}
