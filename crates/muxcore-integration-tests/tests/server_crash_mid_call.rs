//! Seed scenario: a tool call that never answers. The dispatch retries
//! up to `WorkerConfig::max_attempts` with backoff, then the step and
//! the run both fail.

mod common;

use std::time::Duration;

use common::{build_stack, wait_until, FakeServer, Scripted};
use muxcore_executor::{ProposedStep, WorkerConfig};
use muxcore_store::{RunBudgets, RunStatus, StepOutcome};
use serde_json::json;

/// A short wall budget keeps the call's own deadline short too (the
/// router caps a call at `min(run_deadline, 30s)`), so the retry loop
/// runs out within a couple hundred milliseconds instead of 30s.
fn tight_budgets() -> RunBudgets {
    RunBudgets { max_steps: 10, max_wall_ms: 300, max_cost: 10.0 }
}

fn fast_retry() -> WorkerConfig {
    WorkerConfig { max_attempts: 2, base_retry_delay: Duration::from_millis(20), no_progress_threshold: 3 }
}

#[tokio::test]
async fn a_server_that_never_replies_fails_the_run() {
    let server = FakeServer::new("s").with_tool("slow", false, Scripted::Hang);
    let stack = build_stack(vec![server], fast_retry()).await;

    let step = ProposedStep { qualified_name: "s.slow".to_owned(), input: json!({}), cites: vec![] };
    let run = stack.admission.start_run("alice", "plan-3", tight_budgets(), None, vec![step]).await.unwrap();

    let fetched = wait_until(Duration::from_secs(10), || async {
        let r = stack.store.get_run(run.run_id).await.unwrap();
        r.status.is_terminal().then_some(r)
    })
    .await;
    assert_eq!(fetched.status, RunStatus::Failed);

    let steps = stack.store.list_steps(run.run_id).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert!(steps[0].attempts >= 1, "expected at least one retry, got {}", steps[0].attempts);
    match &steps[0].outcome {
        Some(StepOutcome::Error { kind, .. }) => {
            assert!(
                kind == "deadline_exceeded" || kind == "transport_broken",
                "unexpected error kind {kind}"
            );
        },
        other => panic!("expected the never-answered call to finalize as an error, got {other:?}"),
    }
}
