//! Reconstructs a run's event history from durable state.
//!
//! The [`EventBus`](muxcore_events::EventBus) deliberately retains no
//! history of its own (spec §4.9), so a backfill for a subscriber
//! resuming from a cursor has to be rebuilt from the Run Store's actual
//! records rather than replayed from the bus.

use muxcore_core::Timestamp;
use muxcore_events::{EventKind, RunEvent};
use muxcore_store::StepOutcome;
use serde_json::json;

use crate::snapshot::RunSnapshot;

/// Rebuild the ordered sequence of events a run's current durable state
/// implies, assigning fresh sequence numbers starting at 1, then drop
/// everything up to and including `after`.
pub fn synthesize_history(snapshot: &RunSnapshot, after: u64) -> Vec<RunEvent> {
    let mut items: Vec<(Timestamp, EventKind, serde_json::Value)> = Vec::new();

    items.push((
        snapshot.run.submitted_at,
        EventKind::RunStatusChanged,
        json!({"status": "queued"}),
    ));

    for step in &snapshot.steps {
        items.push((
            step.started_at,
            EventKind::StepStarted,
            json!({"step_id": step.step_id, "ordinal": step.ordinal}),
        ));
        if let Some(finished_at) = step.finished_at {
            let outcome = match &step.outcome {
                Some(StepOutcome::Output(_)) => json!({"status": "succeeded"}),
                Some(StepOutcome::Error { kind, message }) => json!({"status": "failed", "kind": kind, "message": message}),
                None => json!({"status": "unknown"}),
            };
            items.push((
                finished_at,
                EventKind::StepFinished,
                json!({"step_id": step.step_id, "ordinal": step.ordinal, "outcome": outcome}),
            ));
        }
    }

    for approval in &snapshot.approvals {
        items.push((
            approval.requested_at,
            EventKind::ApprovalRequested,
            json!({"approval_id": approval.approval_id, "reason": approval.reason}),
        ));
    }

    if let Some(ended_at) = snapshot.run.ended_at {
        items.push((
            ended_at,
            EventKind::RunStatusChanged,
            json!({"status": snapshot.run.status.to_string(), "reason": snapshot.run.terminal_reason}),
        ));
    }

    items.sort_by_key(|(at, ..)| *at);

    items
        .into_iter()
        .enumerate()
        .map(|(i, (at, kind, payload))| {
            #[allow(clippy::cast_possible_truncation)]
            let sequence = (i + 1) as u64;
            RunEvent { run_id: snapshot.run.run_id, at, sequence, kind, payload }
        })
        .filter(|event| event.sequence > after)
        .collect()
}
