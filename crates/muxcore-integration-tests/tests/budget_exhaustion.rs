//! Seed scenario: a plan with more steps than the run's `max_steps`
//! budget allows. The steps within budget all dispatch normally; the
//! run stops before the first step over budget is ever proposed.

mod common;

use std::time::Duration;

use common::{build_stack, wait_until, FakeServer, Scripted};
use muxcore_executor::{ProposedStep, WorkerConfig};
use muxcore_store::{RunBudgets, RunStatus, StepOutcome};
use serde_json::json;

fn budgets() -> RunBudgets {
    RunBudgets { max_steps: 3, max_wall_ms: 10_000, max_cost: 10.0 }
}

#[tokio::test]
async fn a_plan_longer_than_max_steps_stops_at_the_cap() {
    let server = FakeServer::new("s").with_tool("echo", false, Scripted::Reply(json!({"ok": true})));
    let stack = build_stack(vec![server], WorkerConfig::default()).await;

    let steps: Vec<ProposedStep> = (0..5)
        .map(|i| ProposedStep { qualified_name: "s.echo".to_owned(), input: json!({"i": i}), cites: vec![] })
        .collect();
    let run = stack.admission.start_run("alice", "plan-7", budgets(), None, steps).await.unwrap();

    let finished = wait_until(Duration::from_secs(5), || async {
        let r = stack.store.get_run(run.run_id).await.unwrap();
        r.status.is_terminal().then_some(r)
    })
    .await;
    assert_eq!(finished.status, RunStatus::Succeeded);
    assert_eq!(finished.terminal_reason.as_deref(), Some("step_budget_reached"));

    let recorded = stack.store.list_steps(run.run_id).await.unwrap();
    assert_eq!(recorded.len(), 3, "only the three budgeted steps should ever have been proposed");
    for step in &recorded {
        assert!(matches!(step.outcome, Some(StepOutcome::Output(_))), "each budgeted step should have succeeded");
    }
}
