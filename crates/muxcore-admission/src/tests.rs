//! Integration tests driven against an in-memory store and a registry
//! with no live tool server, so every run exercises the approval-pause
//! path rather than an actual dispatch - mirroring how
//! `muxcore-executor`'s own critic tests avoid needing a transport.

use std::sync::Arc;
use std::time::Duration;

use muxcore_artefacts::ArtefactStore;
use muxcore_events::EventBus;
use muxcore_executor::{ExecutorSupervisor, ProposedStep, WorkerConfig};
use muxcore_registry::{Registry, ServerDescriptor, ToolSchema};
use muxcore_router::Router;
use muxcore_store::{ApprovalDecision, RunBudgets, RunStatus, RunStore};
use muxcore_transport::TransportSpec;
use serde_json::json;

use crate::admission::Admission;
use crate::error::AdmissionError;

fn descriptor(id: &str) -> ServerDescriptor {
    ServerDescriptor {
        server_id: id.to_string(),
        transport_spec: TransportSpec::Stdio {
            command: "true".into(),
            args: vec![],
            env: Default::default(),
        },
        auth_material_ref: None,
        declared_capabilities: None,
        policy: Default::default(),
    }
}

fn tool_schema(tool_name: &str, requires_approval: bool) -> ToolSchema {
    ToolSchema {
        server_id: "fs".to_owned(),
        tool_name: tool_name.to_owned(),
        input_schema: json!({}),
        output_schema: None,
        description: String::new(),
        requires_approval,
    }
}

fn budgets() -> RunBudgets {
    RunBudgets { max_steps: 10, max_wall_ms: 60_000, max_cost: 10.0 }
}

async fn harness() -> (Admission, Arc<RunStore>) {
    let store = Arc::new(RunStore::connect_memory().await.unwrap());
    let registry = Arc::new(Registry::new(vec![descriptor("fs")]));
    registry.commit_discovery("fs", vec![tool_schema("delete_file", true)]);
    let router = Arc::new(Router::new(Arc::clone(&registry)));
    let events = Arc::new(EventBus::new());
    let artefacts = Arc::new(ArtefactStore::connect_memory().await.unwrap());
    let supervisor = Arc::new(ExecutorSupervisor::new(
        Arc::clone(&store),
        registry,
        router,
        Arc::clone(&events),
        artefacts,
        WorkerConfig::default(),
    ));
    (Admission::new(Arc::clone(&store), supervisor, events), store)
}

fn step(name: &str) -> ProposedStep {
    ProposedStep { qualified_name: name.to_owned(), input: json!({}), cites: vec![] }
}

#[tokio::test]
async fn start_run_rejects_an_empty_plan() {
    let (admission, _store) = harness().await;
    let err = admission.start_run("alice", "plan-1", budgets(), None, vec![]).await.unwrap_err();
    assert!(matches!(err, AdmissionError::Rejected(_)));
}

#[tokio::test]
async fn start_run_admits_and_pauses_for_approval() {
    let (admission, store) = harness().await;
    let run = admission
        .start_run("alice", "plan-1", budgets(), None, vec![step("fs.delete_file")])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let fetched = store.get_run(run.run_id).await.unwrap();
    assert_eq!(fetched.status, RunStatus::PausedForApproval);

    let snapshot = admission.get_run(run.run_id).await.unwrap();
    assert_eq!(snapshot.approvals.len(), 1);
    assert_eq!(snapshot.approvals[0].decision, ApprovalDecision::Pending);
}

#[tokio::test]
async fn resolve_approval_lets_the_run_proceed_to_dispatch() {
    let (admission, store) = harness().await;
    let run = admission
        .start_run("alice", "plan-1", budgets(), None, vec![step("fs.delete_file")])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let pending = store.list_approvals(run.run_id).await.unwrap();
    assert_eq!(pending.len(), 1);

    admission
        .resolve_approval(pending[0].approval_id, ApprovalDecision::Approved)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    let fetched = store.get_run(run.run_id).await.unwrap();
    assert_ne!(fetched.status, RunStatus::PausedForApproval);
}

#[tokio::test]
async fn cancel_run_stops_a_paused_worker() {
    let (admission, store) = harness().await;
    let run = admission
        .start_run("alice", "plan-1", budgets(), None, vec![step("fs.delete_file")])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    admission.cancel_run(run.run_id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    let fetched = store.get_run(run.run_id).await.unwrap();
    assert_eq!(fetched.status, RunStatus::Cancelled);
}

#[tokio::test]
async fn cancel_run_on_an_unknown_run_is_not_found() {
    let (admission, _store) = harness().await;
    let err = admission.cancel_run(muxcore_core::RunId::new()).await.unwrap_err();
    assert!(matches!(err, AdmissionError::NotFound(_)));
}

#[tokio::test]
async fn get_run_reports_not_found_for_an_unknown_run() {
    let (admission, _store) = harness().await;
    let err = admission.get_run(muxcore_core::RunId::new()).await.unwrap_err();
    assert!(matches!(err, AdmissionError::NotFound(_)));
}

#[tokio::test]
async fn stream_events_backfills_the_approval_request() {
    let (admission, _store) = harness().await;
    let run = admission
        .start_run("alice", "plan-1", budgets(), None, vec![step("fs.delete_file")])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stream = admission.stream_events(run.run_id, None).await.unwrap();
    assert!(stream.history.iter().any(|e| e.kind == muxcore_events::EventKind::ApprovalRequested));
}

#[tokio::test]
async fn stream_events_after_cursor_skips_seen_history() {
    let (admission, _store) = harness().await;
    let run = admission
        .start_run("alice", "plan-1", budgets(), None, vec![step("fs.delete_file")])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let full = admission.stream_events(run.run_id, None).await.unwrap();
    let partial = admission.stream_events(run.run_id, Some(full.history.len() as u64)).await.unwrap();
    assert!(partial.history.is_empty());
}
