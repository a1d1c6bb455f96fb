//! The per-run worker: the Run Executor's plan/critic/dispatch loop
//! (spec §4.8), grounded on `muxcore_connection::worker`'s per-entity
//! loop shape (`tokio::select!` against a `watch` shutdown signal,
//! exponential backoff between retries, state republished after every
//! transition) generalized from "keep one session alive" to "drive one
//! run to a terminal status".

use std::sync::Arc;
use std::time::Duration;

use muxcore_artefacts::ArtefactStore;
use muxcore_core::{BackoffConfig, Deadline, QualifiedToolName, RunId, StepId};
use muxcore_events::{EventBus, EventKind};
use muxcore_registry::Registry;
use muxcore_router::{BudgetCaps, BudgetTotals, Router, RunPolicy, ToolCall};
use muxcore_store::{ApprovalDecision, RunBudgets, RunStatus, RunStore, RunTotals, StepOutcome, StepRecord};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::critic::{self, Critic, RejectionCode, Verdict};
use crate::plan::{PlanSource, ProposedStep};

/// How often a paused run polls for its pending approval's resolution.
const APPROVAL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Caps the exponential backoff applied between retried dispatch attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Stop-condition and retry tuning not already carried in a run's
/// admitted [`RunBudgets`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Dispatch attempts (including the first) before a step's failure is final.
    pub max_attempts: u32,
    /// Base delay before the first retry; doubles per subsequent attempt.
    pub base_retry_delay: Duration,
    /// Consecutive identical critic rejections before a run is abandoned.
    pub no_progress_threshold: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_retry_delay: Duration::from_millis(250),
            no_progress_threshold: 3,
        }
    }
}

/// Why the loop stopped.
enum Outcome {
    /// Carries the terminal reason, if any (`plan_exhausted`,
    /// `step_budget_reached`) - spec §4.8 names a reason for every stop
    /// condition, including the ones that end a run successfully.
    Succeeded(Option<&'static str>),
    Failed(&'static str),
    Cancelled,
}

/// Drive one run to a terminal status.
///
/// Owns the run exclusively for its lifetime: the Run Store's single
/// append-writer assumption (`list_steps` read-then-append in
/// [`muxcore_store::RunStore::append_step`]) depends on no other worker
/// ever stepping this `run_id` concurrently.
#[instrument(skip_all, fields(run_id = %run_id))]
#[allow(clippy::too_many_arguments)]
pub async fn run(
    run_id: RunId,
    store: Arc<RunStore>,
    registry: Arc<Registry>,
    router: Arc<Router>,
    events: Arc<EventBus>,
    artefacts: Arc<ArtefactStore>,
    plan: Arc<dyn PlanSource>,
    config: WorkerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let run_record = match store.get_run(run_id).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "could not load run, aborting worker");
            return;
        },
    };
    let budgets = run_record.budgets;
    let allowlist = run_record.allowed_tools.map(|names| names.into_iter().collect());

    if let Err(e) = store.transition_run_status(run_id, RunStatus::Running, None).await {
        warn!(error = %e, "could not start run, aborting worker");
        return;
    }
    publish(&events, run_id, EventKind::RunStatusChanged, json!({"status": "running"}));

    let policy = RunPolicy::new(allowlist, BudgetTotals::new(to_budget_caps(budgets)));
    let critic = Critic::new(&store, &registry);

    let mut consecutive_rejections: u32 = 0;
    let mut last_rejection_code: Option<RejectionCode> = None;

    let outcome = loop {
        if *shutdown_rx.borrow() {
            break Outcome::Cancelled;
        }

        let completed_steps = match store.list_steps(run_id).await {
            Ok(steps) => steps,
            Err(e) => {
                warn!(error = %e, "failed to read step log");
                break Outcome::Failed("store_unavailable");
            },
        };
        let completed = completed_steps.len();

        if let Err(router_err) = policy.check_budget() {
            break budget_stop_outcome(&router_err.to_string(), completed_steps.last());
        }

        let Some(proposed) = plan.next_step(completed).await else {
            break Outcome::Succeeded(Some("plan_exhausted"));
        };

        let verdict = match critic.check(run_id, &proposed).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "critic could not read run state");
                break Outcome::Failed("store_unavailable");
            },
        };

        match verdict {
            Verdict::Reject(RejectionCode::ApprovalRequired) => {
                match handle_approval_wait(&store, &events, run_id, &proposed, &mut shutdown_rx).await {
                    ApprovalOutcome::Granted => {
                        consecutive_rejections = 0;
                        last_rejection_code = None;
                        continue;
                    },
                    ApprovalOutcome::Rejected => break Outcome::Failed("approval_rejected"),
                    ApprovalOutcome::Cancelled => break Outcome::Cancelled,
                    ApprovalOutcome::StoreError => break Outcome::Failed("store_unavailable"),
                }
            },
            Verdict::Reject(code) => {
                if last_rejection_code == Some(code) {
                    consecutive_rejections += 1;
                } else {
                    last_rejection_code = Some(code);
                    consecutive_rejections = 1;
                }
                if consecutive_rejections >= config.no_progress_threshold {
                    warn!(code = code.as_str(), "critic rejected the same step repeatedly, stopping run");
                    break Outcome::Failed("critic_stuck");
                }
                tokio::time::sleep(APPROVAL_POLL_INTERVAL).await;
                continue;
            },
            Verdict::Admit => {
                consecutive_rejections = 0;
                last_rejection_code = None;
            },
        }

        // `QualifiedToolName::parse` cannot fail: the critic already
        // rejected a malformed name above, short-circuiting this arm.
        let qualified = QualifiedToolName::parse(&proposed.qualified_name).expect("critic admitted a valid name");
        let ordinal = completed as u64 + 1;

        let step_record = match store
            .append_step(
                run_id,
                ordinal,
                qualified.server_id.as_str(),
                qualified.tool_name.as_str(),
                proposed.input.clone(),
            )
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "failed to append step");
                break Outcome::Failed("store_unavailable");
            },
        };
        publish(
            &events,
            run_id,
            EventKind::StepStarted,
            json!({"step_id": step_record.step_id, "ordinal": ordinal, "qualified_name": proposed.qualified_name.clone()}),
        );

        match dispatch_with_retry(
            &router,
            &policy,
            &store,
            &artefacts,
            run_id,
            step_record.step_id,
            ordinal,
            &proposed,
            &budgets,
            &config,
            &mut shutdown_rx,
        )
        .await
        {
            DispatchResult::Cancelled => break Outcome::Cancelled,
            DispatchResult::StoreError => break Outcome::Failed("store_unavailable"),
            DispatchResult::Finalized(record) => {
                publish(
                    &events,
                    run_id,
                    EventKind::StepFinished,
                    json!({"step_id": record.step_id, "ordinal": record.ordinal, "outcome": outcome_label(&record.outcome)}),
                );
                if let Err(e) = persist_totals(&store, &policy, run_id).await {
                    warn!(error = %e, "failed to persist run totals");
                }
                if matches!(record.outcome, Some(StepOutcome::Error { .. })) {
                    break Outcome::Failed("dispatch_failed");
                }
            },
        }
    };

    finalize_run(&store, &events, run_id, outcome).await;
}

fn to_budget_caps(budgets: RunBudgets) -> BudgetCaps {
    BudgetCaps {
        max_steps: budgets.max_steps,
        max_wall_ms: budgets.max_wall_ms,
        max_cost: budgets.max_cost,
    }
}

/// `RunPolicy::check_budget` surfaces `BudgetCapKind::to_string()`
/// (`"max_steps"` / `"max_wall_ms"` / `"max_cost"`) wrapped in
/// `RouterError::BudgetExceeded`; map that back to the terminal
/// [`Outcome`] spec §4.8's stop conditions name.
///
/// Only the step cap is conditional on the last step's outcome: spec
/// §4.8 reads "`steps >= max_steps` → status `succeeded` if last step did
/// not error, else `failed`", while `max_wall_ms`/`max_cost` are
/// unconditionally `failed`.
fn budget_stop_outcome(router_err_display: &str, last_step: Option<&StepRecord>) -> Outcome {
    if router_err_display.contains("max_steps") {
        let last_step_succeeded = matches!(last_step.and_then(|s| s.outcome.as_ref()), Some(StepOutcome::Output(_)));
        if last_step_succeeded {
            Outcome::Succeeded(Some("step_budget_reached"))
        } else {
            Outcome::Failed("step_budget_reached")
        }
    } else if router_err_display.contains("max_wall_ms") {
        Outcome::Failed("wall_budget_exhausted")
    } else if router_err_display.contains("max_cost") {
        Outcome::Failed("cost_budget_exhausted")
    } else {
        Outcome::Failed("budget_exceeded")
    }
}

fn outcome_label(outcome: &Option<StepOutcome>) -> &'static str {
    match outcome {
        Some(StepOutcome::Output(_)) => "output",
        Some(StepOutcome::Error { .. }) => "error",
        None => "pending",
    }
}

fn remaining_deadline(budgets: &RunBudgets, policy: &RunPolicy) -> Deadline {
    let remaining_ms = budgets.max_wall_ms.saturating_sub(policy.elapsed_ms()).max(1);
    Deadline::after(Duration::from_millis(remaining_ms))
}

async fn persist_totals(store: &RunStore, policy: &RunPolicy, run_id: RunId) -> muxcore_store::StoreResult<()> {
    let (steps, cost) = policy.totals();
    store
        .record_totals(
            run_id,
            RunTotals {
                steps,
                cost,
                wall_ms: policy.elapsed_ms(),
            },
        )
        .await
}

enum ApprovalOutcome {
    Granted,
    Rejected,
    Cancelled,
    StoreError,
}

/// Request (if not already pending) and wait out a human approval.
///
/// Pauses the run's durable status for the duration of the wait and
/// resumes it to `running` once granted; a rejection or cancellation
/// leaves the run paused, letting the caller decide the final status.
async fn handle_approval_wait(
    store: &RunStore,
    events: &EventBus,
    run_id: RunId,
    proposed: &ProposedStep,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ApprovalOutcome {
    let reason = critic::approval_reason(&proposed.qualified_name);

    let already_pending = match store.list_approvals(run_id).await {
        Ok(approvals) => approvals
            .iter()
            .any(|a| a.reason == reason && a.decision == ApprovalDecision::Pending),
        Err(e) => {
            warn!(error = %e, "failed to read approvals");
            return ApprovalOutcome::StoreError;
        },
    };

    if !already_pending {
        if let Err(e) = store.request_approval(run_id, None, reason.clone()).await {
            warn!(error = %e, "failed to request approval");
            return ApprovalOutcome::StoreError;
        }
        publish(events, run_id, EventKind::ApprovalRequested, json!({"reason": reason}));
    }

    match store
        .transition_run_status(run_id, RunStatus::PausedForApproval, Some("awaiting_approval".to_owned()))
        .await
    {
        Ok(_) => publish(events, run_id, EventKind::RunStatusChanged, json!({"status": "paused_for_approval"})),
        Err(muxcore_store::StoreError::InvalidTransition { .. }) => {
            // Already paused from an earlier pass through this wait.
        },
        Err(e) => {
            warn!(error = %e, "failed to pause run for approval");
            return ApprovalOutcome::StoreError;
        },
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return ApprovalOutcome::Cancelled;
                }
            },
            () = tokio::time::sleep(APPROVAL_POLL_INTERVAL) => {},
        }

        let approvals = match store.list_approvals(run_id).await {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "failed to poll approvals");
                continue;
            },
        };
        let Some(resolved) = approvals
            .iter()
            .find(|a| a.reason == reason && a.decision != ApprovalDecision::Pending)
        else {
            continue;
        };

        return match resolved.decision {
            ApprovalDecision::Approved => {
                if let Err(e) = store.transition_run_status(run_id, RunStatus::Running, None).await {
                    warn!(error = %e, "failed to resume run after approval");
                    return ApprovalOutcome::StoreError;
                }
                publish(events, run_id, EventKind::RunStatusChanged, json!({"status": "running"}));
                ApprovalOutcome::Granted
            },
            ApprovalDecision::Rejected => ApprovalOutcome::Rejected,
            ApprovalDecision::Pending => unreachable!("filtered out above"),
        };
    }
}

enum DispatchResult {
    Finalized(StepRecord),
    Cancelled,
    StoreError,
}

/// Dispatch one admitted step, retrying transport-level failures with
/// backoff up to `config.max_attempts`, then persist its final outcome.
#[allow(clippy::too_many_arguments)]
async fn dispatch_with_retry(
    router: &Router,
    policy: &RunPolicy,
    store: &RunStore,
    artefacts: &ArtefactStore,
    run_id: RunId,
    step_id: StepId,
    ordinal: u64,
    proposed: &ProposedStep,
    budgets: &RunBudgets,
    config: &WorkerConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> DispatchResult {
    let mut attempt: u32 = 1;
    loop {
        let call = ToolCall {
            qualified_name: proposed.qualified_name.clone(),
            arguments: proposed.input.clone(),
            // The critic already confirmed an `Approved` record exists
            // for any tool that requires one before admitting this step.
            approval_granted: true,
        };
        let deadline = remaining_deadline(budgets, policy);

        let dispatched = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return DispatchResult::Cancelled;
                }
                continue;
            },
            result = router.route(policy, call, deadline) => result,
        };

        match dispatched {
            Ok(value) => {
                let artefact_refs = persist_produced_artefacts(artefacts, store, step_id, &value).await;
                return finalize(store, run_id, ordinal, StepOutcome::Output(value), artefact_refs).await;
            },
            Err(err) => {
                let retriable = err.is_retriable();
                if retriable && attempt < config.max_attempts {
                    if let Err(e) = store.record_attempt(run_id, ordinal).await {
                        warn!(error = %e, "failed to record retry attempt");
                        return DispatchResult::StoreError;
                    }
                    let backoff = BackoffConfig::from_millis(
                        u64::try_from(config.base_retry_delay.as_millis()).unwrap_or(u64::MAX),
                        u64::try_from(MAX_RETRY_DELAY.as_millis()).unwrap_or(u64::MAX),
                        0.2,
                    );
                    let delay = backoff.jittered_delay(attempt, muxcore_core::retry::sample_unit_jitter());
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                return DispatchResult::Cancelled;
                            }
                        },
                        () = tokio::time::sleep(delay) => {},
                    }
                    attempt += 1;
                    continue;
                }

                let core_err: muxcore_core::CoreError = err.into();
                return finalize(
                    store,
                    run_id,
                    ordinal,
                    StepOutcome::Error {
                        kind: core_err.kind.to_string(),
                        message: core_err.message,
                    },
                    Vec::new(),
                )
                .await;
            },
        }
    }
}

async fn finalize(store: &RunStore, run_id: RunId, ordinal: u64, outcome: StepOutcome, artefact_refs: Vec<muxcore_core::ArtefactId>) -> DispatchResult {
    match store.finalize_step(run_id, ordinal, outcome, artefact_refs).await {
        Ok(record) => DispatchResult::Finalized(record),
        Err(e) => {
            warn!(error = %e, "failed to finalize step");
            DispatchResult::StoreError
        },
    }
}

/// Pull any artefacts and citations a tool chose to embed in its result
/// and persist them through the Artefact Store / Run Store, per spec
/// §3's `Step.artefact_refs` and `Citation` entities.
///
/// Convention: a tool result may carry a reserved top-level `artefacts`
/// array of `{ bytes_base64, media_type }` objects, and a `citations`
/// array of `{ locator, artefact_index?, external_ref? }` objects where
/// `artefact_index` indexes into the same result's `artefacts` array.
/// Neither field is required, and an absent or malformed one is treated
/// as "this step produced none" rather than a dispatch failure — the
/// tool's own output is already durable regardless.
async fn persist_produced_artefacts(artefacts: &ArtefactStore, store: &RunStore, step_id: StepId, output: &serde_json::Value) -> Vec<muxcore_core::ArtefactId> {
    use base64::Engine;

    let mut produced = Vec::new();
    let Some(entries) = output.get("artefacts").and_then(serde_json::Value::as_array) else {
        return produced;
    };

    for entry in entries {
        let (Some(encoded), Some(media_type)) = (
            entry.get("bytes_base64").and_then(serde_json::Value::as_str),
            entry.get("media_type").and_then(serde_json::Value::as_str),
        ) else {
            warn!("tool result's artefacts entry missing bytes_base64/media_type, skipping");
            continue;
        };
        let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
            warn!("tool result's artefacts entry had invalid base64, skipping");
            continue;
        };
        let size = bytes.len() as u64;
        match artefacts.put(&bytes, media_type).await {
            Ok(artefact_id) => {
                if let Err(e) = store
                    .record_artefact(muxcore_store::ArtefactRecord {
                        artefact_id: artefact_id.clone(),
                        media_type: media_type.to_owned(),
                        size,
                        created_at: muxcore_core::time::now(),
                        source_step_id: step_id,
                    })
                    .await
                {
                    warn!(error = %e, "failed to record artefact manifest in run store");
                }
                produced.push(artefact_id);
            },
            Err(e) => warn!(error = %e, "failed to store produced artefact"),
        }
    }

    if let Some(citations) = output.get("citations").and_then(serde_json::Value::as_array) {
        for entry in citations {
            let Some(locator) = entry.get("locator").and_then(serde_json::Value::as_str) else {
                warn!("tool result's citations entry missing locator, skipping");
                continue;
            };
            let artefact_id = entry
                .get("artefact_index")
                .and_then(serde_json::Value::as_u64)
                .and_then(|idx| produced.get(idx as usize).cloned());
            let external_ref = entry.get("external_ref").and_then(serde_json::Value::as_str).map(str::to_owned);

            if let Err(e) = store
                .record_citation(muxcore_store::CitationRecord {
                    citation_id: muxcore_core::CitationId::new(),
                    step_id,
                    artefact_id,
                    external_ref,
                    locator: locator.to_owned(),
                })
                .await
            {
                warn!(error = %e, "failed to record citation");
            }
        }
    }

    produced
}

async fn finalize_run(store: &RunStore, events: &EventBus, run_id: RunId, outcome: Outcome) {
    let (status, reason) = match outcome {
        Outcome::Succeeded(reason) => (RunStatus::Succeeded, reason.map(str::to_owned)),
        Outcome::Failed(reason) => (RunStatus::Failed, Some(reason.to_owned())),
        Outcome::Cancelled => (RunStatus::Cancelled, Some("cancelled_by_caller".to_owned())),
    };

    match store.transition_run_status(run_id, status, reason.clone()).await {
        Ok(_) => {
            info!(status = %status, reason = ?reason, "run reached a terminal status");
            publish(
                events,
                run_id,
                EventKind::RunStatusChanged,
                json!({"status": status.to_string(), "reason": reason}),
            );
        },
        Err(e) => warn!(error = %e, target_status = %status, "failed to persist terminal run status"),
    }
}

fn publish(events: &EventBus, run_id: RunId, kind: EventKind, payload: serde_json::Value) {
    events.publish(run_id, kind, payload);
}
