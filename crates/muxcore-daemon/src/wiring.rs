//! Wires every crate's runtime handle together from a loaded [`Config`].
//!
//! Every subsystem handle is built up front and held in one struct so
//! `main` can shut them down in the reverse order it started them, and
//! run crash recovery before anything
//! else can observe a mid-replay run (spec §4.6).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use muxcore_admission::Admission;
use muxcore_config::Config;
use muxcore_connection::{ConnectionConfig, ConnectionManager};
use muxcore_events::EventBus;
use muxcore_executor::{ExecutorSupervisor, WorkerConfig};
use muxcore_registry::{Registry, ServerDescriptor};
use muxcore_router::Router;
use muxcore_store::RunStore;
use muxcore_transport::TransportLimits;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

#[cfg(test)]
mod tests;

/// Every long-lived handle the daemon holds for its process lifetime.
pub struct Daemon {
    /// Tool server registry, published into by the Connection Manager.
    pub registry: Arc<Registry>,
    /// Owns one worker per configured tool server.
    pub connections: ConnectionManager,
    /// Durable run/step/approval/artefact/citation log.
    pub store: Arc<RunStore>,
    /// Content-addressed artefact blob store.
    pub artefacts: Arc<muxcore_artefacts::ArtefactStore>,
    /// In-process event fan-out.
    pub events: Arc<EventBus>,
    /// Validates and dispatches tool calls.
    pub router: Arc<Router>,
    /// Owns one worker per in-flight run.
    pub supervisor: Arc<ExecutorSupervisor>,
    /// The Admission Interface surface onto all of the above.
    pub admission: Arc<Admission>,
    /// Background artefact retention sweep, if `artefacts.sweep_interval_secs`
    /// configured one; signalled to stop and joined in [`Daemon::shutdown`].
    sweep: Option<SweepHandle>,
}

/// The running retention sweep task plus the signal that stops it.
struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Daemon {
    /// Bring up every subsystem in the order spec §4.6 requires: the Run
    /// Store connects and replays crash recovery before the Connection
    /// Manager or Event Bus exist, so nothing can observe a run mid-replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the Run Store or Artefact Store cannot be
    /// opened, or if crash recovery fails.
    pub async fn start(config: &Config, data_dir: &Path) -> anyhow::Result<Self> {
        let store = Arc::new(RunStore::connect_embedded(&data_dir.join("runs").display().to_string()).await?);
        let recovered = store.recover_crashed_runs().await?;
        if !recovered.is_empty() {
            info!(count = recovered.len(), "recovered runs from a prior crash");
        }

        let artefacts = Arc::new(muxcore_artefacts::ArtefactStore::connect_embedded(&data_dir.join("artefacts").display().to_string()).await?);

        let descriptors: Vec<ServerDescriptor> = config.servers.iter().map(muxcore_config::ServerConfigEntry::to_descriptor).collect();
        let registry = Arc::new(Registry::new(descriptors.clone()));
        let connections = ConnectionManager::start(Arc::clone(&registry), descriptors, connection_config(&config.sessions));

        let events = Arc::new(EventBus::new());
        let router = Arc::new(Router::new(Arc::clone(&registry)));
        let supervisor = Arc::new(ExecutorSupervisor::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&router),
            Arc::clone(&events),
            Arc::clone(&artefacts),
            worker_config(config),
        ));
        let admission = Arc::new(Admission::new(Arc::clone(&store), Arc::clone(&supervisor), Arc::clone(&events)));

        let sweep = spawn_retention_sweep(Arc::clone(&artefacts), config.artefacts);

        Ok(Self {
            registry,
            connections,
            store,
            artefacts,
            events,
            router,
            supervisor,
            admission,
            sweep,
        })
    }

    /// Signal every run worker and every connection worker to stop, and
    /// wait (up to `grace` each) for them to finish. Run workers are
    /// drained first: a run in the middle of a step should get the
    /// chance to finish or fail that step's dispatch before the session
    /// it was calling through disappears out from under it.
    pub async fn shutdown(self, grace: Duration) {
        self.supervisor.drain_and_stop(grace).await;
        self.connections.drain_and_stop(grace).await;
        if let Some(sweep) = self.sweep {
            let _ = sweep.shutdown_tx.send(true);
            let _ = tokio::time::timeout(grace, sweep.task).await;
        }
    }
}

/// Spawn the background task that periodically calls
/// [`muxcore_artefacts::ArtefactStore::enforce_retention`], per
/// `artefacts.sweep_interval_secs`. Returns `None` when no interval is
/// configured, leaving artefacts to accumulate forever (the default).
fn spawn_retention_sweep(artefacts: Arc<muxcore_artefacts::ArtefactStore>, config: muxcore_config::ArtefactsConfig) -> Option<SweepHandle> {
    let interval_secs = config.sweep_interval_secs?;
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await; // first tick fires immediately; skip it so we wait a full interval before the first sweep
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return;
                    }
                },
                _ = ticker.tick() => {
                    match artefacts.enforce_retention(config.retention).await {
                        Ok(removed) if removed > 0 => info!(removed, "artefact retention sweep ran"),
                        Ok(_) => {},
                        Err(e) => tracing::warn!(error = %e, "artefact retention sweep failed"),
                    }
                },
            }
        }
    });

    Some(SweepHandle { shutdown_tx, task })
}

/// Project `sessions:` onto the Connection Manager's own tunables,
/// falling back to [`ConnectionConfig::default`] for the fields spec
/// §6's configuration schema deliberately doesn't expose as a per-field
/// override (transport limits, stabilization period, drain grace).
fn connection_config(sessions: &muxcore_config::SessionsConfig) -> ConnectionConfig {
    ConnectionConfig {
        transport_limits: TransportLimits {
            connect_deadline: Duration::from_millis(sessions.connect_deadline_ms),
            ..TransportLimits::default()
        },
        call_deadline: Duration::from_millis(sessions.connect_deadline_ms),
        heartbeat_interval: Duration::from_millis(sessions.heartbeat_interval_ms),
        failure_threshold: sessions.failure_threshold,
        cooldown: Duration::from_millis(sessions.cooldown_ms),
        ..ConnectionConfig::default()
    }
}

/// Project `runs.retry`/`runs.stop` onto the Run Executor's worker
/// tunables. Backoff jitter is not exposed in the config schema; the
/// worker's own `MAX_RETRY_DELAY` cap and `BackoffConfig::default`'s
/// jitter fraction are reused rather than inventing a config field spec
/// §6 doesn't name.
fn worker_config(config: &Config) -> WorkerConfig {
    WorkerConfig {
        max_attempts: config.runs.retry.max_attempts,
        base_retry_delay: Duration::from_millis(config.runs.retry.base_retry_delay_ms),
        no_progress_threshold: config.runs.stop.no_progress_threshold,
    }
}
