//! The Run Store itself: a `SurrealDB`-backed append-only log of runs,
//! steps, approvals, artefacts, and citations.
//!
//! An embedded `SurrealKV`-backed connection for production, an
//! in-memory one for tests, both reached through the same
//! `Surreal<engine::any::Any>` client.

use crate::error::{StoreError, StoreResult};
use crate::model::{
    ApprovalDecision, ApprovalRecord, ArtefactRecord, CitationRecord, RunBudgets, RunRecord, RunStatus, RunTotals,
    StepOutcome, StepRecord,
};
use muxcore_core::{ApprovalId, ArtefactId, CitationId, RunId, StepId, Timestamp};
use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tracing::{info, warn};

const RUNS: &str = "runs";
const STEPS: &str = "steps";
const APPROVALS: &str = "approvals";
const ARTEFACTS: &str = "artefacts";
const CITATIONS: &str = "citations";

/// Whether `to` is a legal next status from `from`, per spec §4.8's
/// transition graph.
#[must_use]
pub fn is_allowed_transition(from: RunStatus, to: RunStatus) -> bool {
    use RunStatus::{Cancelled, Failed, PausedForApproval, Queued, Running, Succeeded};
    matches!(
        (from, to),
        (Queued, Running)
            | (Queued, Cancelled)
            | (Running, PausedForApproval)
            | (Running, Succeeded)
            | (Running, Failed)
            | (Running, Cancelled)
            | (PausedForApproval, Running)
            | (PausedForApproval, Cancelled)
    )
}

/// Durable, transactional store for runs, steps, approvals, artefacts,
/// and citations.
pub struct RunStore {
    db: Surreal<Any>,
}

impl RunStore {
    /// Connect to an embedded, on-disk `SurrealKV` store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection cannot be
    /// established.
    pub async fn connect_embedded(path: &str) -> StoreResult<Self> {
        let endpoint = format!("surrealkv://{path}");
        let db = surrealdb::engine::any::connect(endpoint)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        db.use_ns("muxcore")
            .use_db("runs")
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    /// Connect to an in-memory store, for tests and ephemeral runs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection cannot be
    /// established.
    pub async fn connect_memory() -> StoreResult<Self> {
        let db = surrealdb::engine::any::connect("mem://")
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        db.use_ns("muxcore")
            .use_db("test")
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    /// Create a new run in status `queued`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    pub async fn create_run(
        &self,
        submitter: impl Into<String>,
        plan_ref: impl Into<String>,
        budgets: RunBudgets,
        allowed_tools: Option<Vec<String>>,
    ) -> StoreResult<RunRecord> {
        let record = RunRecord {
            run_id: RunId::new(),
            submitted_at: muxcore_core::time::now(),
            submitter: submitter.into(),
            plan_ref: plan_ref.into(),
            status: RunStatus::Queued,
            budgets,
            allowed_tools,
            totals: RunTotals::default(),
            ended_at: None,
            terminal_reason: None,
        };
        self.put(RUNS, &record.run_id.to_string(), &record).await?;
        Ok(record)
    }

    /// Fetch a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such run exists.
    pub async fn get_run(&self, run_id: RunId) -> StoreResult<RunRecord> {
        self.get(RUNS, &run_id.to_string())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))
    }

    /// Transition a run's status, validating against the allowed graph
    /// and rejecting mutation of an already-terminal run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyTerminal`] if the run is terminal, or
    /// [`StoreError::InvalidTransition`] if `to` is not reachable from the
    /// run's current status.
    pub async fn transition_run_status(&self, run_id: RunId, to: RunStatus, reason: Option<String>) -> StoreResult<RunRecord> {
        let mut run = self.get_run(run_id).await?;
        if run.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal(run_id.to_string()));
        }
        if !is_allowed_transition(run.status, to) {
            return Err(StoreError::InvalidTransition {
                run_id: run_id.to_string(),
                from: run.status.to_string(),
                to: to.to_string(),
            });
        }
        run.status = to;
        if to.is_terminal() {
            run.ended_at = Some(muxcore_core::time::now());
            run.terminal_reason = reason;
        }
        self.put(RUNS, &run_id.to_string(), &run).await?;
        Ok(run)
    }

    /// Record a step dispatch's cost/step/time against the run's totals.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyTerminal`] if the run is already
    /// terminal.
    pub async fn record_totals(&self, run_id: RunId, totals: RunTotals) -> StoreResult<()> {
        let mut run = self.get_run(run_id).await?;
        if run.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal(run_id.to_string()));
        }
        run.totals = totals;
        self.put(RUNS, &run_id.to_string(), &run).await
    }

    /// Append a new step at the next dense ordinal for its run.
    ///
    /// Concurrent appends to the same run never happen by construction
    /// (spec §5: one owning Executor worker per run), so a read-then-write
    /// without an additional transactional guard is sufficient here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OrdinalConflict`] if `ordinal` is not exactly
    /// one past the run's current step count.
    pub async fn append_step(
        &self,
        run_id: RunId,
        ordinal: u64,
        server_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: serde_json::Value,
    ) -> StoreResult<StepRecord> {
        let existing = self.list_steps(run_id).await?;
        let expected = existing.len() as u64 + 1;
        if ordinal != expected {
            return Err(StoreError::OrdinalConflict {
                run_id: run_id.to_string(),
                expected,
                got: ordinal,
            });
        }
        let record = StepRecord {
            step_id: StepId::new(),
            run_id,
            ordinal,
            server_id: server_id.into(),
            tool_name: tool_name.into(),
            input,
            outcome: None,
            started_at: muxcore_core::time::now(),
            finished_at: None,
            attempts: 0,
            artefact_refs: Vec::new(),
        };
        self.put(STEPS, &step_key(run_id, ordinal), &record).await?;
        Ok(record)
    }

    /// Record one more dispatch attempt for a not-yet-finalized step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such step exists, or
    /// [`StoreError::Backend`] if the step was already finalized.
    pub async fn record_attempt(&self, run_id: RunId, ordinal: u64) -> StoreResult<u32> {
        let mut step: StepRecord = self
            .get(STEPS, &step_key(run_id, ordinal))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("step {run_id}/{ordinal}")))?;
        if step.outcome.is_some() {
            return Err(StoreError::Backend(format!("step {run_id}/{ordinal} already finalized")));
        }
        step.attempts += 1;
        self.put(STEPS, &step_key(run_id, ordinal), &step).await?;
        Ok(step.attempts)
    }

    /// Finalize a step with its outcome. Immutable once called.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such step exists.
    pub async fn finalize_step(&self, run_id: RunId, ordinal: u64, outcome: StepOutcome, artefact_refs: Vec<ArtefactId>) -> StoreResult<StepRecord> {
        let mut step: StepRecord = self
            .get(STEPS, &step_key(run_id, ordinal))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("step {run_id}/{ordinal}")))?;
        step.outcome = Some(outcome);
        step.finished_at = Some(muxcore_core::time::now());
        step.artefact_refs = artefact_refs;
        self.put(STEPS, &step_key(run_id, ordinal), &step).await?;
        Ok(step)
    }

    /// List every step for a run, in ascending `ordinal` order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    pub async fn list_steps(&self, run_id: RunId) -> StoreResult<Vec<StepRecord>> {
        let mut steps: Vec<StepRecord> = self
            .db
            .query("SELECT * FROM type::table($table) WHERE run_id = $run_id")
            .bind(("table", STEPS.to_string()))
            .bind(("run_id", run_id))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .take(0)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        steps.sort_by_key(|s| s.ordinal);
        Ok(steps)
    }

    /// Request a new approval for a run (optionally scoped to one step).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    pub async fn request_approval(&self, run_id: RunId, step_id: Option<StepId>, reason: impl Into<String>) -> StoreResult<ApprovalRecord> {
        let record = ApprovalRecord {
            approval_id: ApprovalId::new(),
            run_id,
            step_id,
            reason: reason.into(),
            requested_at: muxcore_core::time::now(),
            resolved_at: None,
            decision: ApprovalDecision::Pending,
        };
        self.put(APPROVALS, &record.approval_id.to_string(), &record).await?;
        Ok(record)
    }

    /// List every approval requested for a run, most recently requested
    /// last.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    pub async fn list_approvals(&self, run_id: RunId) -> StoreResult<Vec<ApprovalRecord>> {
        let mut approvals: Vec<ApprovalRecord> = self
            .db
            .query("SELECT * FROM type::table($table) WHERE run_id = $run_id")
            .bind(("table", APPROVALS.to_string()))
            .bind(("run_id", run_id))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .take(0)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        approvals.sort_by_key(|a| a.requested_at);
        Ok(approvals)
    }

    /// Resolve a pending approval exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such approval exists, or
    /// [`StoreError::AlreadyResolved`] if it was already decided.
    pub async fn resolve_approval(&self, approval_id: ApprovalId, decision: ApprovalDecision) -> StoreResult<ApprovalRecord> {
        let mut approval: ApprovalRecord = self
            .get(APPROVALS, &approval_id.to_string())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("approval {approval_id}")))?;
        if approval.decision != ApprovalDecision::Pending {
            return Err(StoreError::AlreadyResolved(approval_id.to_string()));
        }
        approval.decision = decision;
        approval.resolved_at = Some(muxcore_core::time::now());
        self.put(APPROVALS, &approval_id.to_string(), &approval).await?;
        Ok(approval)
    }

    /// Record artefact metadata (the bytes themselves live in the
    /// Artefact Store).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    pub async fn record_artefact(&self, record: ArtefactRecord) -> StoreResult<()> {
        self.put(ARTEFACTS, &record.artefact_id.to_string(), &record).await
    }

    /// Record a citation binding a step's output to a supporting source.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    pub async fn record_citation(&self, record: CitationRecord) -> StoreResult<()> {
        self.put(CITATIONS, &record.citation_id.to_string(), &record).await
    }

    /// Crash-recovery replay: any run whose last durable status is
    /// non-terminal is marked `failed` with reason `crash_recovery`.
    ///
    /// Must run once at startup before any Executor worker picks up
    /// existing runs, per spec §4.6.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on a storage failure.
    pub async fn recover_crashed_runs(&self) -> StoreResult<Vec<RunId>> {
        let runs: Vec<RunRecord> = self
            .db
            .select(RUNS)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut recovered = Vec::new();
        for mut run in runs {
            if !run.status.is_terminal() {
                warn!(run_id = %run.run_id, status = %run.status, "marking non-terminal run failed on crash recovery");
                run.status = RunStatus::Failed;
                run.ended_at = Some(muxcore_core::time::now());
                run.terminal_reason = Some("crash_recovery".to_string());
                self.put(RUNS, &run.run_id.to_string(), &run).await?;
                recovered.push(run.run_id);
            }
        }
        if !recovered.is_empty() {
            info!(count = recovered.len(), "crash recovery marked runs failed");
        }
        Ok(recovered)
    }

    async fn put<T>(&self, table: &str, id: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + for<'de> Deserialize<'de> + Clone + 'static,
    {
        let _existing: Option<T> = self
            .db
            .update((table, id))
            .content(value.clone())
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get<T>(&self, table: &str, id: &str) -> StoreResult<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.db
            .select((table, id))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn step_key(run_id: RunId, ordinal: u64) -> String {
    format!("{run_id}_{ordinal}")
}

impl std::fmt::Debug for RunStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStore").finish_non_exhaustive()
    }
}
