//! Persisted record types for the data model in spec §3.

use muxcore_core::{ApprovalId, ArtefactId, CitationId, RunId, StepId, Timestamp};
use serde::{Deserialize, Serialize};

/// A run's status. Transitions are validated against the graph in
/// [`crate::store::ALLOWED_TRANSITIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Admitted, not yet picked up by an Executor worker.
    Queued,
    /// An Executor worker owns this run and is dispatching steps.
    Running,
    /// Blocked on at least one pending approval.
    PausedForApproval,
    /// Terminal: finished without error.
    Succeeded,
    /// Terminal: finished with an unrecoverable error.
    Failed,
    /// Terminal: stopped by an explicit cancel.
    Cancelled,
}

impl RunStatus {
    /// Whether this status is terminal (no further transitions allowed).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::PausedForApproval => "paused_for_approval",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// The budget caps a run is admitted with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunBudgets {
    /// Maximum number of steps.
    pub max_steps: u32,
    /// Maximum wall-clock duration, in milliseconds.
    pub max_wall_ms: u64,
    /// Maximum cumulative tool cost.
    pub max_cost: f64,
}

/// Running totals against a run's [`RunBudgets`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunTotals {
    /// Steps dispatched so far.
    pub steps: u32,
    /// Cumulative cost reported so far.
    pub cost: f64,
    /// Wall-clock milliseconds elapsed so far.
    pub wall_ms: u64,
}

/// A durable run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Stable run identifier.
    pub run_id: RunId,
    /// Wall-clock time the run was admitted.
    pub submitted_at: Timestamp,
    /// Opaque identifier of whoever submitted the run.
    pub submitter: String,
    /// A reference to the plan or prompt that seeded this run.
    pub plan_ref: String,
    /// Current status.
    pub status: RunStatus,
    /// Admitted budget caps.
    pub budgets: RunBudgets,
    /// Qualified tool names this run may call. `None` means no restriction
    /// beyond whatever the Router's per-server policy already denies.
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
    /// Running totals.
    pub totals: RunTotals,
    /// Wall-clock time the run reached a terminal status, if it has.
    pub ended_at: Option<Timestamp>,
    /// Machine-readable reason code for a terminal status (e.g.
    /// `wall_budget_exhausted`, `critic_stuck`, `approval_rejected`).
    pub terminal_reason: Option<String>,
}

/// The outcome of one dispatched step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The tool call returned a result.
    Output(serde_json::Value),
    /// The tool call, or its dispatch, failed.
    Error {
        /// The stable error kind, per the core taxonomy.
        kind: String,
        /// A human-readable message.
        message: String,
    },
}

/// A durable step record. Immutable once finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Stable step identifier.
    pub step_id: StepId,
    /// The run this step belongs to.
    pub run_id: RunId,
    /// Dense, monotonically increasing position within the run, starting
    /// at 1.
    pub ordinal: u64,
    /// The server the tool call targeted.
    pub server_id: String,
    /// The tool name local to that server.
    pub tool_name: String,
    /// The arguments the step was dispatched with.
    pub input: serde_json::Value,
    /// `None` until the step is finalized.
    pub outcome: Option<StepOutcome>,
    /// Wall-clock time dispatch began.
    pub started_at: Timestamp,
    /// Wall-clock time the step was finalized, if it has been.
    pub finished_at: Option<Timestamp>,
    /// Number of dispatch attempts made for this step (retries included).
    pub attempts: u32,
    /// Artefacts produced by this step.
    pub artefact_refs: Vec<ArtefactId>,
}

/// An approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Not yet resolved.
    Pending,
    /// A human approved the action.
    Approved,
    /// A human rejected the action.
    Rejected,
}

/// A durable approval record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Stable approval identifier, unique within its run.
    pub approval_id: ApprovalId,
    /// The run this approval gates.
    pub run_id: RunId,
    /// The step awaiting approval, if the approval is step-scoped.
    pub step_id: Option<StepId>,
    /// Why approval was required.
    pub reason: String,
    /// Wall-clock time the approval was requested.
    pub requested_at: Timestamp,
    /// Wall-clock time the approval was resolved, if it has been.
    pub resolved_at: Option<Timestamp>,
    /// Current decision.
    pub decision: ApprovalDecision,
}

/// Metadata for a content-addressed artefact (bytes live in the Artefact
/// Store; only the reference and bookkeeping live here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtefactRecord {
    /// Content-addressed identifier.
    pub artefact_id: ArtefactId,
    /// MIME-ish media type of the blob.
    pub media_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Wall-clock time the artefact was first stored.
    pub created_at: Timestamp,
    /// The step that produced it.
    pub source_step_id: StepId,
}

/// A binding from a claim in a step's output to its supporting source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationRecord {
    /// Stable citation identifier.
    pub citation_id: CitationId,
    /// The step whose output this citation supports.
    pub step_id: StepId,
    /// The artefact backing this citation, if internal.
    pub artefact_id: Option<ArtefactId>,
    /// An external reference (URL, DOI, ...), if not artefact-backed.
    pub external_ref: Option<String>,
    /// A locator within the source (page, offset, section).
    pub locator: String,
}
