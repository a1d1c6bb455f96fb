//! Plan sources.
//!
//! Spec §1's Non-goals rule out an opinion on which model does the
//! planning and rule out a generic workflow language; a plan is simply an
//! ordered list of steps with typed input. [`PlanSource`] is the seam
//! between "something external decided what to do next" and the
//! executor's own step loop - it is deliberately the *only* trait in this
//! crate that reaches outside the coordination core, mirroring how
//! `muxcore_transport::Transport` is the one seam `muxcore-connection`
//! reaches through.
//!
//! [`StaticPlan`] is the one concrete source this crate ships: a fixed
//! ordered list of steps submitted up front at `start_run`. Anything that
//! needs to extend the plan as the run progresses (an actual planner
//! model, a re-planning loop) implements `PlanSource` itself and is out
//! of scope here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

/// A single step proposed by a plan, not yet admitted by the [`crate::critic::Critic`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedStep {
    /// `<server_id>.<tool_name>`, parsed by the router the same way a
    /// dispatched call's qualified name is.
    pub qualified_name: String,
    /// Tool input, validated against the tool's schema by the router.
    pub input: Value,
    /// Ordinals of prior steps in this run whose output this step cites.
    ///
    /// Spec §4.8 step 2 requires the critic to confirm "required
    /// citations from prior steps exist" before a side-effecting call is
    /// made; this is how a plan declares what it depends on.
    #[serde(default)]
    pub cites: Vec<u64>,
}

/// Supplies the next step of a run, in order.
///
/// A plan source is consulted once per iteration of the executor's step
/// loop. Returning `None` signals plan exhaustion, which the worker
/// treats as one of spec §4.8's stop conditions once no step has made
/// progress for `no_progress_threshold` consecutive iterations.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Produce the next proposed step, or `None` if the plan has nothing
    /// further to propose right now.
    ///
    /// `completed` is the number of steps this run has already finalized
    /// (successfully or not); a source may use it purely as a cursor, or
    /// may also use it to decide whether to extend itself.
    async fn next_step(&self, completed: usize) -> Option<ProposedStep>;
}

/// A plan fixed in full at submission time.
///
/// This is the only `PlanSource` spec §4.8 requires: "plans are ordered
/// step lists with typed inputs/outputs" (§1 Non-goals), so the common
/// case is simply walking a `Vec<ProposedStep>` by the executor's own
/// completed-step cursor.
#[derive(Debug)]
pub struct StaticPlan {
    steps: Mutex<Vec<ProposedStep>>,
}

impl StaticPlan {
    /// Build a plan from a fixed, already-ordered step list.
    #[must_use]
    pub fn new(steps: Vec<ProposedStep>) -> Self {
        Self {
            steps: Mutex::new(steps),
        }
    }
}

#[async_trait]
impl PlanSource for StaticPlan {
    async fn next_step(&self, completed: usize) -> Option<ProposedStep> {
        let steps = self.steps.lock().await;
        steps.get(completed).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(name: &str) -> ProposedStep {
        ProposedStep {
            qualified_name: name.to_owned(),
            input: json!({}),
            cites: vec![],
        }
    }

    #[tokio::test]
    async fn static_plan_yields_steps_in_order() {
        let plan = StaticPlan::new(vec![step("fs.read_file"), step("fs.write_file")]);
        assert_eq!(plan.next_step(0).await.unwrap().qualified_name, "fs.read_file");
        assert_eq!(plan.next_step(1).await.unwrap().qualified_name, "fs.write_file");
    }

    #[tokio::test]
    async fn static_plan_is_exhausted_past_its_length() {
        let plan = StaticPlan::new(vec![step("fs.read_file")]);
        assert!(plan.next_step(1).await.is_none());
    }

    #[tokio::test]
    async fn static_plan_carries_citations() {
        let mut s = step("fs.write_file");
        s.cites = vec![0, 1];
        let plan = StaticPlan::new(vec![s]);
        assert_eq!(plan.next_step(0).await.unwrap().cites, vec![0, 1]);
    }
}
