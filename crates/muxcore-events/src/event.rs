//! The event envelope and its kinds, per spec §4.9/§6.
//!
//! Every event carries `{ run_id, at, sequence, kind, payload }`; `sequence`
//! is monotonic per run so a subscriber can resume from a known
//! `(run_id, sequence)` cursor. The payload is a plain JSON value rather
//! than a typed variant per kind: `muxcore-events` has no dependency on
//! `muxcore-store` or `muxcore-executor`, so the shape of a step's outcome
//! or a run's terminal reason lives with its producer, not here.

use muxcore_core::{RunId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The four event kinds the Run Executor emits, per spec §4.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A step was dispatched.
    StepStarted,
    /// A step was finalized, successfully or with an error.
    StepFinished,
    /// A step's tool requires a human approval before it may proceed.
    ApprovalRequested,
    /// The run's overall status changed.
    RunStatusChanged,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StepStarted => "step_started",
            Self::StepFinished => "step_finished",
            Self::ApprovalRequested => "approval_requested",
            Self::RunStatusChanged => "run_status_changed",
        };
        write!(f, "{s}")
    }
}

/// One published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// The run this event belongs to.
    pub run_id: RunId,
    /// Wall-clock time the event was published.
    pub at: Timestamp,
    /// Monotonic position of this event within its run's event stream.
    pub sequence: u64,
    /// Which of the four kinds this is.
    pub kind: EventKind,
    /// Kind-specific detail, e.g. `{"step_id": ..., "ordinal": ...}` for
    /// `StepStarted`, or `{"status": "succeeded", "reason": ...}` for
    /// `RunStatusChanged`.
    pub payload: Value,
}

/// A `(run_id, sequence)` position a subscriber can resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCursor {
    /// The run the cursor is positioned within.
    pub run_id: RunId,
    /// The last sequence number the subscriber has already seen.
    pub sequence: u64,
}
