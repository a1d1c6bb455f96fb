//! Per-run budget guard: step count, wall-clock, and cost caps.
//!
//! Tool cost is opaque to the Router — it is whatever the tool server's
//! response reports, discovered only after a call completes — so the
//! pre-dispatch guard can only check the caps it knows ahead of time
//! (steps, wall-clock); cost is checked by the Executor after each call
//! completes via [`BudgetTotals::record_cost`].

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// The budget caps declared when a run was admitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetCaps {
    /// Maximum number of steps the run may execute.
    pub max_steps: u32,
    /// Maximum wall-clock duration for the whole run, in milliseconds.
    pub max_wall_ms: u64,
    /// Maximum cumulative tool cost, in the tool servers' reported units.
    pub max_cost: f64,
}

/// Live totals against a run's [`BudgetCaps`].
pub struct BudgetTotals {
    caps: BudgetCaps,
    state: RwLock<Totals>,
}

#[derive(Clone, Copy, Default)]
struct Totals {
    steps: u32,
    cost: f64,
}

/// Why a budget guard check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCapKind {
    /// `max_steps` would be exceeded.
    Steps,
    /// `max_wall_ms` has already elapsed.
    WallClock,
    /// `max_cost` would be exceeded.
    Cost,
}

impl std::fmt::Display for BudgetCapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Steps => "max_steps",
            Self::WallClock => "max_wall_ms",
            Self::Cost => "max_cost",
        };
        write!(f, "{s}")
    }
}

impl BudgetTotals {
    /// Start tracking a fresh run against `caps`.
    #[must_use]
    pub fn new(caps: BudgetCaps) -> Self {
        Self {
            caps,
            state: RwLock::new(Totals::default()),
        }
    }

    /// Check whether one more step may be dispatched, given the run has
    /// been running for `elapsed_ms`. Does not record anything; call
    /// [`Self::record_step`] once the step is actually dispatched.
    #[must_use]
    pub fn check_pre_call(&self, elapsed_ms: u64) -> Result<(), BudgetCapKind> {
        let totals = *self.state.read().expect("budget lock poisoned");
        if totals.steps >= self.caps.max_steps {
            return Err(BudgetCapKind::Steps);
        }
        if elapsed_ms >= self.caps.max_wall_ms {
            return Err(BudgetCapKind::WallClock);
        }
        if totals.cost >= self.caps.max_cost {
            return Err(BudgetCapKind::Cost);
        }
        Ok(())
    }

    /// Record that a step was dispatched (called once per call, regardless
    /// of outcome, so retried calls each count toward `max_steps`).
    pub fn record_step(&self) {
        self.state.write().expect("budget lock poisoned").steps += 1;
    }

    /// Record the cost a completed call reported.
    pub fn record_cost(&self, cost: f64) {
        self.state.write().expect("budget lock poisoned").cost += cost;
    }

    /// Current totals snapshot: `(steps, cost)`.
    #[must_use]
    pub fn totals(&self) -> (u32, f64) {
        let totals = *self.state.read().expect("budget lock poisoned");
        (totals.steps, totals.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_cap_is_enforced() {
        let budget = BudgetTotals::new(BudgetCaps {
            max_steps: 1,
            max_wall_ms: 60_000,
            max_cost: 100.0,
        });
        assert!(budget.check_pre_call(0).is_ok());
        budget.record_step();
        assert_eq!(budget.check_pre_call(0), Err(BudgetCapKind::Steps));
    }

    #[test]
    fn cost_accumulates_and_blocks_once_exceeded() {
        let budget = BudgetTotals::new(BudgetCaps {
            max_steps: 100,
            max_wall_ms: 60_000,
            max_cost: 1.0,
        });
        budget.record_cost(1.5);
        assert_eq!(budget.check_pre_call(0), Err(BudgetCapKind::Cost));
    }
}
