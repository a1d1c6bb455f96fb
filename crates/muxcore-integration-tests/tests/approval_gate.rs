//! Seed scenario: a tool that requires approval pauses the run until a
//! human resolves it, then either proceeds (approved) or fails
//! (rejected).

mod common;

use std::time::Duration;

use common::{build_stack, wait_until, FakeServer, Scripted};
use muxcore_executor::{ProposedStep, WorkerConfig};
use muxcore_store::{ApprovalDecision, RunBudgets, RunStatus};
use serde_json::json;

fn budgets() -> RunBudgets {
    RunBudgets { max_steps: 10, max_wall_ms: 10_000, max_cost: 10.0 }
}

fn step() -> ProposedStep {
    ProposedStep { qualified_name: "s.publish".to_owned(), input: json!({}), cites: vec![] }
}

#[tokio::test]
async fn approved_run_proceeds_to_dispatch() {
    let server = FakeServer::new("s").with_tool("publish", true, Scripted::Reply(json!({"published": true})));
    let stack = build_stack(vec![server], WorkerConfig::default()).await;

    let run = stack.admission.start_run("alice", "plan-4", budgets(), None, vec![step()]).await.unwrap();

    let paused = wait_until(Duration::from_secs(5), || async {
        let r = stack.store.get_run(run.run_id).await.unwrap();
        matches!(r.status, RunStatus::PausedForApproval).then_some(r)
    })
    .await;
    assert_eq!(paused.status, RunStatus::PausedForApproval);

    let stream = stack.admission.stream_events(run.run_id, None).await.unwrap();
    assert!(stream.history.iter().any(|e| e.kind == muxcore_events::EventKind::ApprovalRequested));

    let pending = stack.store.list_approvals(run.run_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].decision, ApprovalDecision::Pending);

    stack.admission.resolve_approval(pending[0].approval_id, ApprovalDecision::Approved).await.unwrap();

    let finished = wait_until(Duration::from_secs(5), || async {
        let r = stack.store.get_run(run.run_id).await.unwrap();
        r.status.is_terminal().then_some(r)
    })
    .await;
    assert_eq!(finished.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn rejected_run_fails() {
    let server = FakeServer::new("s").with_tool("publish", true, Scripted::Reply(json!({"published": true})));
    let stack = build_stack(vec![server], WorkerConfig::default()).await;

    let run = stack.admission.start_run("alice", "plan-5", budgets(), None, vec![step()]).await.unwrap();

    wait_until(Duration::from_secs(5), || async {
        let r = stack.store.get_run(run.run_id).await.unwrap();
        matches!(r.status, RunStatus::PausedForApproval).then_some(())
    })
    .await;

    let pending = stack.store.list_approvals(run.run_id).await.unwrap();
    stack.admission.resolve_approval(pending[0].approval_id, ApprovalDecision::Rejected).await.unwrap();

    let finished = wait_until(Duration::from_secs(5), || async {
        let r = stack.store.get_run(run.run_id).await.unwrap();
        r.status.is_terminal().then_some(r)
    })
    .await;
    assert_eq!(finished.status, RunStatus::Failed);
    assert_eq!(finished.terminal_reason.as_deref(), Some("approval_rejected"));
}
