//! The pre-dispatch critic.
//!
//! Spec §4.8 step 2 requires "minimum contracts" be checked *before* any
//! side-effecting call is made: cited prior steps exist and succeeded,
//! and no step proceeds whose sensitivity requires an approval that
//! hasn't been granted. This is deliberately separate from, and runs
//! before, `muxcore_router::Router::route`'s own `requires_approval`
//! check - the router's check exists to protect the router against
//! being called directly; the critic's check exists to stop the
//! executor's loop from even trying. Rejecting a step here never reaches
//! a tool server; rejecting at the router means a call was already
//! dispatched to one.

use muxcore_core::{QualifiedToolName, RunId};
use muxcore_registry::Registry;
use muxcore_store::{ApprovalDecision, RunStore, StepRecord};

use crate::plan::ProposedStep;

/// Why the critic refused to admit a proposed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCode {
    /// `qualified_name` does not parse as `<server_id>.<tool_name>`.
    MalformedName,
    /// The registry has no schema for this server/tool pair.
    UnknownTool,
    /// A cited ordinal does not name any step recorded so far.
    MissingCitation,
    /// A cited step exists but did not succeed.
    FailedCitation,
    /// The tool requires approval and none has been granted yet.
    ApprovalRequired,
}

impl RejectionCode {
    /// The code as a stable snake_case string, suitable for a
    /// `terminal_reason` or an event payload.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedName => "malformed_name",
            Self::UnknownTool => "unknown_tool",
            Self::MissingCitation => "missing_citation",
            Self::FailedCitation => "failed_citation",
            Self::ApprovalRequired => "approval_required",
        }
    }
}

/// The critic's verdict on one proposed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The step may be dispatched.
    Admit,
    /// The step is refused; it must not be dispatched.
    Reject(RejectionCode),
}

/// Checks a proposed step's prerequisites against durable run state.
///
/// Holds no state of its own; everything it needs is read fresh from the
/// [`RunStore`] and [`Registry`] on each call, since the proposing plan
/// may run arbitrarily far ahead of what has actually been dispatched.
pub struct Critic<'a> {
    store: &'a RunStore,
    registry: &'a Registry,
}

impl<'a> Critic<'a> {
    /// Build a critic over a run store and tool registry.
    #[must_use]
    pub fn new(store: &'a RunStore, registry: &'a Registry) -> Self {
        Self { store, registry }
    }

    /// Check one proposed step's citations and approval sensitivity.
    ///
    /// # Errors
    ///
    /// Returns [`muxcore_store::StoreError`] if the durable state needed
    /// to decide (prior steps, approvals) cannot be read.
    pub async fn check(
        &self,
        run_id: RunId,
        step: &ProposedStep,
    ) -> muxcore_store::StoreResult<Verdict> {
        let Some(qualified) = QualifiedToolName::parse(&step.qualified_name) else {
            return Ok(Verdict::Reject(RejectionCode::MalformedName));
        };

        if self
            .registry
            .tool_schema(qualified.server_id.as_str(), &qualified.tool_name)
            .is_err()
        {
            return Ok(Verdict::Reject(RejectionCode::UnknownTool));
        }

        let prior_steps = self.store.list_steps(run_id).await?;
        if let Some(code) = check_citations(&step.cites, &prior_steps) {
            return Ok(Verdict::Reject(code));
        }

        let schema = self
            .registry
            .tool_schema(qualified.server_id.as_str(), &qualified.tool_name)
            .expect("checked above");
        // Mirrors `muxcore_router::Router::route`'s OR of the discovered
        // schema's flag against the server's configured policy list: either
        // source gates the call, so the critic must not admit a step the
        // router would turn around and reject with `RequiresApproval`.
        let policy_requires_approval = self
            .registry
            .descriptor(qualified.server_id.as_str())
            .is_ok_and(|descriptor| descriptor.policy.requires_approval.iter().any(|name| name == step.qualified_name.as_str()));
        if schema.requires_approval || policy_requires_approval {
            let reason = approval_reason(&step.qualified_name);
            let approvals = self.store.list_approvals(run_id).await?;
            let granted = approvals
                .iter()
                .any(|a| a.decision == ApprovalDecision::Approved && a.reason == reason);
            if !granted {
                return Ok(Verdict::Reject(RejectionCode::ApprovalRequired));
            }
        }

        Ok(Verdict::Admit)
    }
}

/// The `reason` stamped on an approval request raised for a given tool.
///
/// Shared between the critic's lookup and [`crate::worker`]'s
/// `request_approval` call so a resolved approval for one tool can never
/// be read back as covering a different one, since a run may require
/// approval for more than one tool.
#[must_use]
pub fn approval_reason(qualified_name: &str) -> String {
    format!("tool '{qualified_name}' requires approval")
}

fn check_citations(cites: &[u64], prior_steps: &[StepRecord]) -> Option<RejectionCode> {
    for &ordinal in cites {
        let Some(cited) = prior_steps.iter().find(|s| s.ordinal == ordinal) else {
            return Some(RejectionCode::MissingCitation);
        };
        let succeeded = matches!(
            cited.outcome,
            Some(muxcore_store::StepOutcome::Output(_))
        );
        if !succeeded {
            return Some(RejectionCode::FailedCitation);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxcore_registry::{Registry, ServerDescriptor, ToolSchema};
    use muxcore_store::RunBudgets;
    use muxcore_transport::TransportSpec;
    use serde_json::json;

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

    async fn setup() -> (RunStore, Registry, RunId) {
        setup_with(descriptor("fs")).await
    }

    async fn setup_with(server: ServerDescriptor) -> (RunStore, Registry, RunId) {
        let store = RunStore::connect_memory().await.unwrap();
        let run = store
            .create_run(
                "tester",
                "plan-1",
                RunBudgets {
                    max_steps: 10,
                    max_wall_ms: 60_000,
                    max_cost: 10.0,
                },
                None,
            )
            .await
            .unwrap();
        let registry = Registry::new(vec![server]);
        (store, registry, run.run_id)
    }

    fn step(name: &str, cites: Vec<u64>) -> ProposedStep {
        ProposedStep {
            qualified_name: name.to_owned(),
            input: json!({}),
            cites,
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

    #[tokio::test]
    async fn malformed_name_is_rejected() {
        let (store, registry, run_id) = setup().await;
        let critic = Critic::new(&store, &registry);
        let verdict = critic.check(run_id, &step("not-qualified", vec![])).await.unwrap();
        assert_eq!(verdict, Verdict::Reject(RejectionCode::MalformedName));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let (store, registry, run_id) = setup().await;
        let critic = Critic::new(&store, &registry);
        let verdict = critic.check(run_id, &step("fs.read_file", vec![])).await.unwrap();
        assert_eq!(verdict, Verdict::Reject(RejectionCode::UnknownTool));
    }

    #[tokio::test]
    async fn missing_citation_is_rejected() {
        let (store, registry, run_id) = setup().await;
        registry.commit_discovery("fs", vec![tool_schema("write_file", false)]);
        let critic = Critic::new(&store, &registry);
        let verdict = critic
            .check(run_id, &step("fs.write_file", vec![1]))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Reject(RejectionCode::MissingCitation));
    }

    #[tokio::test]
    async fn approval_required_without_grant_is_rejected() {
        let (store, registry, run_id) = setup().await;
        registry.commit_discovery("fs", vec![tool_schema("delete_file", true)]);
        let critic = Critic::new(&store, &registry);
        let verdict = critic
            .check(run_id, &step("fs.delete_file", vec![]))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Reject(RejectionCode::ApprovalRequired));
    }

    #[tokio::test]
    async fn approval_required_via_server_policy_without_grant_is_rejected() {
        let mut server = descriptor("fs");
        server.policy.requires_approval = vec!["fs.write_file".to_owned()];
        let (store, registry, run_id) = setup_with(server).await;
        // The discovered schema itself does not flag this tool; only the
        // server's configured policy does.
        registry.commit_discovery("fs", vec![tool_schema("write_file", false)]);
        let critic = Critic::new(&store, &registry);
        let verdict = critic.check(run_id, &step("fs.write_file", vec![])).await.unwrap();
        assert_eq!(verdict, Verdict::Reject(RejectionCode::ApprovalRequired));
    }

    #[tokio::test]
    async fn approval_required_via_server_policy_with_grant_admits() {
        let mut server = descriptor("fs");
        server.policy.requires_approval = vec!["fs.write_file".to_owned()];
        let (store, registry, run_id) = setup_with(server).await;
        registry.commit_discovery("fs", vec![tool_schema("write_file", false)]);
        store
            .request_approval(run_id, None, approval_reason("fs.write_file"))
            .await
            .unwrap();
        let pending = store.list_approvals(run_id).await.unwrap();
        store
            .resolve_approval(pending[0].approval_id, ApprovalDecision::Approved)
            .await
            .unwrap();

        let critic = Critic::new(&store, &registry);
        let verdict = critic.check(run_id, &step("fs.write_file", vec![])).await.unwrap();
        assert_eq!(verdict, Verdict::Admit);
    }

    #[tokio::test]
    async fn approval_required_with_grant_admits() {
        let (store, registry, run_id) = setup().await;
        registry.commit_discovery("fs", vec![tool_schema("delete_file", true)]);
        store
            .request_approval(run_id, None, approval_reason("fs.delete_file"))
            .await
            .unwrap();
        let pending = store.list_approvals(run_id).await.unwrap();
        store
            .resolve_approval(pending[0].approval_id, ApprovalDecision::Approved)
            .await
            .unwrap();

        let critic = Critic::new(&store, &registry);
        let verdict = critic
            .check(run_id, &step("fs.delete_file", vec![]))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Admit);
    }
}
