//! The Admission Interface itself: five operations over shared handles
//! to the Run Store, the Run Executor's supervisor, and the event bus.
//!
//! Grounded on `muxcore_connection::manager::ConnectionManager`'s role as
//! the one object an outer layer holds to drive a subsystem it doesn't
//! otherwise reach into directly - here the outer layer is whatever HTTP
//! gateway a deployment puts in front of this (out of scope per spec §1),
//! and `Admission` is its entire surface onto the coordination core.

use std::sync::Arc;

use muxcore_core::{ApprovalId, RunId};
use muxcore_events::{EventBus, EventFilter, EventReceiver, RunEvent};
use muxcore_executor::{ExecutorError, ExecutorSupervisor, ProposedStep, StaticPlan};
use muxcore_store::{ApprovalDecision, ApprovalRecord, RunBudgets, RunRecord, RunStatus, RunStore};
use tracing::instrument;

use crate::error::{AdmissionError, AdmissionResult};
use crate::history::synthesize_history;
use crate::snapshot::RunSnapshot;

/// Backfilled history plus a live handoff, returned by [`Admission::stream_events`].
pub struct EventStream {
    /// Events reconstructed from durable state at the moment of the call,
    /// in ascending order, already filtered to whatever a caller's
    /// `after` cursor asked to skip.
    ///
    /// These sequence numbers are assigned fresh on each call and are
    /// **not** comparable to [`EventBus`]'s own per-run sequence space:
    /// the bus deliberately keeps no history (spec §4.9), so a cursor
    /// spanning a process restart can only be honored against durable
    /// state, not replayed from the bus itself. A caller resuming after
    /// a restart should treat `history` as authoritative up to "now" and
    /// `live` as "from here on", accepting that an event published in
    /// the narrow window between the two may appear in both.
    pub history: Vec<RunEvent>,
    /// A live subscription, already filtered to this run, for events
    /// published from this call onward.
    pub live: EventReceiver,
}

/// The five operations an outer layer uses to admit, observe, and
/// control runs.
pub struct Admission {
    store: Arc<RunStore>,
    supervisor: Arc<ExecutorSupervisor>,
    events: Arc<EventBus>,
}

impl Admission {
    /// Build an Admission handle over the shared subsystem handles a
    /// daemon wires up once at startup.
    #[must_use]
    pub fn new(store: Arc<RunStore>, supervisor: Arc<ExecutorSupervisor>, events: Arc<EventBus>) -> Self {
        Self { store, supervisor, events }
    }

    /// Admit a new run: persist it in `queued`, then hand its fixed step
    /// list to a freshly started Executor worker.
    ///
    /// Spec §1's Non-goals rule out a generic workflow language or an
    /// opinion on the planner model, so the only plan shape this
    /// operation accepts is the ordered, fully-specified step list a
    /// [`StaticPlan`] wraps.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Rejected`] if `steps` is empty. Returns
    /// an error mapped from the store or executor if admission or
    /// supervision fails.
    #[instrument(skip_all)]
    pub async fn start_run(
        &self,
        submitter: impl Into<String>,
        plan_ref: impl Into<String>,
        budgets: RunBudgets,
        allowed_tools: Option<Vec<String>>,
        steps: Vec<ProposedStep>,
    ) -> AdmissionResult<RunRecord> {
        if steps.is_empty() {
            return Err(AdmissionError::Rejected("a run must be submitted with at least one step".to_owned()));
        }

        let run = self.store.create_run(submitter, plan_ref, budgets, allowed_tools).await?;
        let plan = Arc::new(StaticPlan::new(steps));
        self.supervisor.start_run(run.run_id, plan).await?;
        Ok(run)
    }

    /// Cancel a run.
    ///
    /// If a worker currently owns the run, it is signalled to stop at its
    /// next check (spec §5: only the owning worker may transition its
    /// own run, so `Admission` never writes `cancelled` out from under a
    /// live worker). If no worker owns it - it was admitted but not yet
    /// picked up, or recovered into `queued` after a crash - the run is
    /// cancelled directly.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::AlreadyTerminal`] if the run has already
    /// reached a terminal status.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn cancel_run(&self, run_id: RunId) -> AdmissionResult<RunRecord> {
        match self.supervisor.cancel_run(run_id).await {
            Ok(()) => Ok(self.store.get_run(run_id).await?),
            Err(ExecutorError::NotSupervised(_)) => {
                let run = self.store.get_run(run_id).await?;
                if run.status == RunStatus::Queued {
                    Ok(self
                        .store
                        .transition_run_status(run_id, RunStatus::Cancelled, Some("cancelled before dispatch".to_owned()))
                        .await?)
                } else {
                    Err(AdmissionError::AlreadyTerminal(run_id.to_string()))
                }
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a pending approval. The owning worker discovers the
    /// resolution on its own poll of [`RunStore::list_approvals`]; this
    /// operation only needs to write the decision.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] if no such approval exists,
    /// or [`AdmissionError::AlreadyResolved`] if it was already decided.
    #[instrument(skip(self), fields(approval_id = %approval_id))]
    pub async fn resolve_approval(&self, approval_id: ApprovalId, decision: ApprovalDecision) -> AdmissionResult<ApprovalRecord> {
        Ok(self.store.resolve_approval(approval_id, decision).await?)
    }

    /// Assemble a point-in-time snapshot of a run: its record, every step
    /// dispatched so far, and every approval requested so far.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] if no such run exists.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn get_run(&self, run_id: RunId) -> AdmissionResult<RunSnapshot> {
        let run = self.store.get_run(run_id).await?;
        let steps = self.store.list_steps(run_id).await?;
        let approvals = self.store.list_approvals(run_id).await?;
        Ok(RunSnapshot { run, steps, approvals })
    }

    /// Observe a run's event stream, resuming from a durable backfill and
    /// handing off to a live subscription.
    ///
    /// `after` is the last sequence number the caller has already seen in
    /// its own prior reconstruction of `history`, or `None` to request
    /// everything recorded so far.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] if no such run exists.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn stream_events(&self, run_id: RunId, after: Option<u64>) -> AdmissionResult<EventStream> {
        let snapshot = self.get_run(run_id).await?;
        let history = synthesize_history(&snapshot, after.unwrap_or(0));
        let live = self.events.subscribe(EventFilter::for_run(run_id));
        Ok(EventStream { history, live })
    }
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission").finish_non_exhaustive()
    }
}
