//! The Router itself: resolve a qualified tool name, validate arguments,
//! apply the policy gate, and dispatch through the Connection Manager's
//! RPC session.

use crate::error::{RouterError, RouterResult};
use crate::policy::{RateLimiterRegistry, RunPolicy};
use muxcore_core::{Deadline, QualifiedToolName};
use muxcore_registry::Registry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// One tool call a caller wants routed, before resolution.
pub struct ToolCall {
    /// The raw `<server_id>.<tool_name>` string as the planner emitted it.
    pub qualified_name: String,
    /// The call's arguments, to be validated against the tool's schema.
    pub arguments: Value,
    /// Whether a human has already resolved the approval this tool
    /// requires, if any. Ignored for tools that don't require approval.
    pub approval_granted: bool,
}

/// Default per-call deadline when the run's own deadline leaves more time
/// than this available.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves, validates, and dispatches tool calls against the registry.
pub struct Router {
    registry: Arc<Registry>,
    rate_limiters: RateLimiterRegistry,
}

impl Router {
    /// Build a router over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            rate_limiters: RateLimiterRegistry::new(),
        }
    }

    /// Run the full resolve/validate/dispatch pipeline for one call.
    ///
    /// `run_deadline` bounds the whole run; the call is dispatched with
    /// `min(run_deadline, DEFAULT_CALL_TIMEOUT)` so no single call can
    /// consume a run's entire remaining budget.
    ///
    /// # Errors
    ///
    /// Returns the first [`RouterError`] raised by resolution, argument
    /// validation, the policy gate, or the dispatched call itself.
    #[instrument(skip(self, policy, call), fields(qualified_name = %call.qualified_name))]
    pub async fn route(&self, policy: &RunPolicy, call: ToolCall, run_deadline: Deadline) -> RouterResult<Value> {
        let qualified_name = QualifiedToolName::parse(&call.qualified_name)
            .ok_or_else(|| RouterError::BadToolName(call.qualified_name.clone()))?;
        let server_id = qualified_name.server_id.as_str();

        if !policy.allows(&qualified_name) {
            return Err(RouterError::PolicyDenied {
                rule: "allowlist".to_string(),
            });
        }

        let descriptor = self.registry.descriptor(server_id).map_err(RouterError::from)?;
        let server_policy = &descriptor.policy;
        if server_policy.deny_tools.iter().any(|name| name == call.qualified_name.as_str()) {
            return Err(RouterError::PolicyDenied {
                rule: "deny_tools".to_string(),
            });
        }
        if !server_policy.allow_tools.is_empty() && !server_policy.allow_tools.iter().any(|name| name == call.qualified_name.as_str()) {
            return Err(RouterError::PolicyDenied {
                rule: "allow_tools".to_string(),
            });
        }

        let schema = self
            .registry
            .tool_schema(server_id, &qualified_name.tool_name)
            .map_err(RouterError::from)?;

        let requires_approval = schema.requires_approval || server_policy.requires_approval.iter().any(|name| name == call.qualified_name.as_str());
        if requires_approval && !call.approval_granted {
            return Err(RouterError::RequiresApproval);
        }

        validate_arguments(&schema.input_schema, &call.arguments)?;

        if !self.rate_limiters.try_acquire(server_id, server_policy.rate_limit_per_sec, server_policy.rate_limit_burst) {
            return Err(RouterError::PolicyDenied {
                rule: "rate_limit".to_string(),
            });
        }

        policy.check_budget()?;

        let session = self.registry.require_routable(server_id).map_err(RouterError::from)?;

        policy.record_step();
        let call_deadline = run_deadline.min(Deadline::after(DEFAULT_CALL_TIMEOUT));
        let result = session
            .call(&qualified_name.tool_name, Some(call.arguments), call_deadline)
            .await
            .map_err(RouterError::Dispatch)?;

        if let Some(cost) = result.get("cost").and_then(Value::as_f64) {
            policy.record_cost(cost);
        }

        Ok(result)
    }
}

fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), RouterError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| RouterError::InvalidArguments {
        pointer: "/".to_string(),
        detail: format!("tool's own input schema does not compile: {e}"),
    })?;

    if let Some(first) = validator.iter_errors(arguments).next() {
        return Err(RouterError::InvalidArguments {
            pointer: first.instance_path.to_string(),
            detail: first.to_string(),
        });
    }
    Ok(())
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxcore_registry::{ServerDescriptor, ServerPolicy, ToolSchema};
    use muxcore_transport::TransportSpec;

    fn descriptor(id: &str) -> ServerDescriptor {
        descriptor_with_policy(id, ServerPolicy::default())
    }

    fn descriptor_with_policy(id: &str, policy: ServerPolicy) -> ServerDescriptor {
        ServerDescriptor {
            server_id: id.to_string(),
            transport_spec: TransportSpec::Stdio {
                command: "true".into(),
                args: vec![],
                env: Default::default(),
            },
            auth_material_ref: None,
            declared_capabilities: None,
            policy,
        }
    }

    fn unbudgeted_policy() -> RunPolicy {
        RunPolicy::new(
            None,
            crate::budget::BudgetTotals::new(crate::budget::BudgetCaps {
                max_steps: 10,
                max_wall_ms: 60_000,
                max_cost: 10.0,
            }),
        )
    }

    #[tokio::test]
    async fn unresolvable_name_is_rejected_before_touching_the_registry() {
        let registry = Arc::new(Registry::new(vec![descriptor("alpha")]));
        let router = Router::new(registry);
        let policy = RunPolicy::new(
            None,
            crate::budget::BudgetTotals::new(crate::budget::BudgetCaps {
                max_steps: 10,
                max_wall_ms: 60_000,
                max_cost: 10.0,
            }),
        );
        let call = ToolCall {
            qualified_name: "not-qualified".to_string(),
            arguments: serde_json::json!({}),
            approval_granted: false,
        };
        let err = router
            .route(&policy, call, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::BadToolName(_)));
    }

    #[tokio::test]
    async fn unknown_server_is_rejected() {
        let registry = Arc::new(Registry::new(vec![descriptor("alpha")]));
        let router = Router::new(registry);
        let policy = RunPolicy::new(
            None,
            crate::budget::BudgetTotals::new(crate::budget::BudgetCaps {
                max_steps: 10,
                max_wall_ms: 60_000,
                max_cost: 10.0,
            }),
        );
        let call = ToolCall {
            qualified_name: "beta.search".to_string(),
            arguments: serde_json::json!({}),
            approval_granted: false,
        };
        let err = router
            .route(&policy, call, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::UnknownServer(_)));
    }

    #[tokio::test]
    async fn tool_requiring_approval_is_blocked_without_grant() {
        let registry = Arc::new(Registry::new(vec![descriptor("alpha")]));
        registry.update_session_state("alpha", muxcore_rpc::SessionState::Ready);
        registry.commit_discovery(
            "alpha",
            vec![ToolSchema {
                server_id: "alpha".into(),
                tool_name: "delete_file".into(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
                description: "deletes a file".into(),
                requires_approval: true,
            }],
        );
        let router = Router::new(registry);
        let policy = RunPolicy::new(
            None,
            crate::budget::BudgetTotals::new(crate::budget::BudgetCaps {
                max_steps: 10,
                max_wall_ms: 60_000,
                max_cost: 10.0,
            }),
        );
        let call = ToolCall {
            qualified_name: "alpha.delete_file".to_string(),
            arguments: serde_json::json!({}),
            approval_granted: false,
        };
        let err = router
            .route(&policy, call, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::RequiresApproval));
    }

    #[tokio::test]
    async fn arguments_failing_schema_are_rejected_before_dispatch() {
        let registry = Arc::new(Registry::new(vec![descriptor("alpha")]));
        registry.update_session_state("alpha", muxcore_rpc::SessionState::Ready);
        registry.commit_discovery(
            "alpha",
            vec![ToolSchema {
                server_id: "alpha".into(),
                tool_name: "search".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "required": ["query"],
                    "properties": {"query": {"type": "string"}},
                }),
                output_schema: None,
                description: "search the web".into(),
                requires_approval: false,
            }],
        );
        let router = Router::new(registry);
        let policy = RunPolicy::new(
            None,
            crate::budget::BudgetTotals::new(crate::budget::BudgetCaps {
                max_steps: 10,
                max_wall_ms: 60_000,
                max_cost: 10.0,
            }),
        );
        let call = ToolCall {
            qualified_name: "alpha.search".to_string(),
            arguments: serde_json::json!({}),
            approval_granted: false,
        };
        let err = router
            .route(&policy, call, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn exhausted_budget_blocks_before_dispatch() {
        let registry = Arc::new(Registry::new(vec![descriptor("alpha")]));
        registry.update_session_state("alpha", muxcore_rpc::SessionState::Ready);
        registry.commit_discovery(
            "alpha",
            vec![ToolSchema {
                server_id: "alpha".into(),
                tool_name: "search".into(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
                description: "search the web".into(),
                requires_approval: false,
            }],
        );
        let router = Router::new(registry);
        let policy = RunPolicy::new(
            None,
            crate::budget::BudgetTotals::new(crate::budget::BudgetCaps {
                max_steps: 0,
                max_wall_ms: 60_000,
                max_cost: 10.0,
            }),
        );
        let call = ToolCall {
            qualified_name: "alpha.search".to_string(),
            arguments: serde_json::json!({}),
            approval_granted: false,
        };
        let err = router
            .route(&policy, call, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::BudgetExceeded(_)));
    }

    #[tokio::test]
    async fn server_level_deny_tools_blocks_even_without_a_discovered_schema() {
        let registry = Arc::new(Registry::new(vec![descriptor_with_policy(
            "alpha",
            ServerPolicy {
                deny_tools: vec!["alpha.delete_file".to_string()],
                ..ServerPolicy::default()
            },
        )]));
        let router = Router::new(registry);
        let call = ToolCall {
            qualified_name: "alpha.delete_file".to_string(),
            arguments: serde_json::json!({}),
            approval_granted: true,
        };
        let err = router
            .route(&unbudgeted_policy(), call, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::PolicyDenied { rule } if rule == "deny_tools"));
    }

    #[tokio::test]
    async fn server_level_allow_tools_blocks_anything_not_listed() {
        let registry = Arc::new(Registry::new(vec![descriptor_with_policy(
            "alpha",
            ServerPolicy {
                allow_tools: vec!["alpha.search".to_string()],
                ..ServerPolicy::default()
            },
        )]));
        registry.update_session_state("alpha", muxcore_rpc::SessionState::Ready);
        registry.commit_discovery(
            "alpha",
            vec![ToolSchema {
                server_id: "alpha".into(),
                tool_name: "delete_file".into(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
                description: "deletes a file".into(),
                requires_approval: false,
            }],
        );
        let router = Router::new(registry);
        let call = ToolCall {
            qualified_name: "alpha.delete_file".to_string(),
            arguments: serde_json::json!({}),
            approval_granted: true,
        };
        let err = router
            .route(&unbudgeted_policy(), call, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::PolicyDenied { rule } if rule == "allow_tools"));
    }

    #[tokio::test]
    async fn server_level_requires_approval_applies_even_when_the_schema_does_not_declare_it() {
        let registry = Arc::new(Registry::new(vec![descriptor_with_policy(
            "alpha",
            ServerPolicy {
                requires_approval: vec!["alpha.publish".to_string()],
                ..ServerPolicy::default()
            },
        )]));
        registry.update_session_state("alpha", muxcore_rpc::SessionState::Ready);
        registry.commit_discovery(
            "alpha",
            vec![ToolSchema {
                server_id: "alpha".into(),
                tool_name: "publish".into(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
                description: "publishes a document".into(),
                requires_approval: false,
            }],
        );
        let router = Router::new(registry);
        let call = ToolCall {
            qualified_name: "alpha.publish".to_string(),
            arguments: serde_json::json!({}),
            approval_granted: false,
        };
        let err = router
            .route(&unbudgeted_policy(), call, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::RequiresApproval));
    }
}
