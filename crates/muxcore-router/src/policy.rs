//! The per-run policy gate: allowlist, rate limit, budget, and the
//! approval-requirement check, applied in that order so the cheapest
//! check rejects first.

use crate::budget::BudgetTotals;
use crate::error::RouterError;
use crate::rate_limit::TokenBucket;
use muxcore_core::{QualifiedToolName, Stopwatch};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Everything the policy gate needs to judge one run's calls.
pub struct RunPolicy {
    /// If set, only qualified names in this set may be dispatched.
    allowlist: Option<HashSet<String>>,
    budget: BudgetTotals,
    clock: Stopwatch,
}

impl RunPolicy {
    /// Build a run's policy from its admitted allowlist and budget caps.
    #[must_use]
    pub fn new(allowlist: Option<HashSet<String>>, budget: BudgetTotals) -> Self {
        Self {
            allowlist,
            budget,
            clock: Stopwatch::start(),
        }
    }

    /// Whether `qualified_name` is permitted by this run's allowlist. An
    /// absent allowlist permits everything.
    #[must_use]
    pub fn allows(&self, qualified_name: &QualifiedToolName) -> bool {
        match &self.allowlist {
            None => true,
            Some(set) => set.contains(&qualified_name.to_string()),
        }
    }

    /// Check the budget caps known ahead of dispatch (steps, wall-clock).
    pub fn check_budget(&self) -> Result<(), RouterError> {
        self.budget
            .check_pre_call(self.clock.elapsed_ms())
            .map_err(|kind| RouterError::BudgetExceeded(kind.to_string()))
    }

    /// Record that a step is about to be dispatched.
    pub fn record_step(&self) {
        self.budget.record_step();
    }

    /// Record the cost a completed call reported.
    pub fn record_cost(&self, cost: f64) {
        self.budget.record_cost(cost);
    }

    /// Current `(steps, cost)` totals, for persisting a run's progress.
    #[must_use]
    pub fn totals(&self) -> (u32, f64) {
        self.budget.totals()
    }

    /// Milliseconds elapsed since this policy was constructed.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.clock.elapsed_ms()
    }
}

/// Per-server rate limiters, created lazily the first time a server is
/// routed to and reused for the life of the process.
#[derive(Default)]
pub struct RateLimiterRegistry {
    buckets: RwLock<HashMap<String, TokenBucket>>,
}

impl RateLimiterRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take one token for `server_id`, creating its bucket from
    /// `(rate_per_sec, burst)` on first use. A server with no configured
    /// rate limit (`rate_per_sec` is `None`) always allows.
    #[must_use]
    pub fn try_acquire(&self, server_id: &str, rate_per_sec: Option<f64>, burst: u32) -> bool {
        let Some(rate_per_sec) = rate_per_sec else {
            return true;
        };

        if let Some(bucket) = self.buckets.read().expect("rate limiter registry poisoned").get(server_id) {
            return bucket.try_acquire();
        }

        let mut guard = self.buckets.write().expect("rate limiter registry poisoned");
        let bucket = guard
            .entry(server_id.to_string())
            .or_insert_with(|| TokenBucket::new(rate_per_sec, burst));
        bucket.try_acquire()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetCaps;

    fn name(s: &str) -> QualifiedToolName {
        QualifiedToolName::parse(s).unwrap()
    }

    #[test]
    fn absent_allowlist_permits_everything() {
        let policy = RunPolicy::new(
            None,
            BudgetTotals::new(BudgetCaps {
                max_steps: 10,
                max_wall_ms: 60_000,
                max_cost: 10.0,
            }),
        );
        assert!(policy.allows(&name("alpha.search")));
    }

    #[test]
    fn allowlist_blocks_names_not_listed() {
        let mut set = HashSet::new();
        set.insert("alpha.search".to_string());
        let policy = RunPolicy::new(
            Some(set),
            BudgetTotals::new(BudgetCaps {
                max_steps: 10,
                max_wall_ms: 60_000,
                max_cost: 10.0,
            }),
        );
        assert!(policy.allows(&name("alpha.search")));
        assert!(!policy.allows(&name("alpha.write_file")));
    }

    #[test]
    fn rate_limiter_registry_shares_bucket_across_calls() {
        let registry = RateLimiterRegistry::new();
        assert!(registry.try_acquire("alpha", Some(1.0), 1));
        assert!(!registry.try_acquire("alpha", Some(1.0), 1));
    }

    #[test]
    fn rate_limiter_registry_allows_when_unconfigured() {
        let registry = RateLimiterRegistry::new();
        for _ in 0..10 {
            assert!(registry.try_acquire("beta", None, 1));
        }
    }
}
