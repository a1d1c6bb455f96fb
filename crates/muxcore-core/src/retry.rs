//! Exponential backoff with jitter, shared by the Connection Manager's
//! reconnect loop and the Run Executor's dispatch retry policy.

use crate::time::Jitter;
use std::time::Duration;

/// Configuration for an exponential backoff sequence.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct BackoffConfig {
    /// The delay before the first retry.
    pub base_delay: Duration,
    /// An upper bound no computed delay may exceed.
    pub max_delay: Duration,
    /// Fractional jitter applied to each computed delay (e.g. `0.2` = ±20%).
    pub jitter: f64,
}

impl BackoffConfig {
    /// Build a config from millisecond inputs, as configuration files
    /// naturally express them.
    #[must_use]
    pub fn from_millis(base_delay_ms: u64, max_delay_ms: u64, jitter: f64) -> Self {
        Self {
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            jitter,
        }
    }

    /// Compute the delay for the given zero-indexed attempt number, before
    /// jitter is sampled.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis().saturating_mul(1u128 << attempt.min(32));
        let capped = exp.min(self.max_delay.as_millis());
        Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX))
    }

    /// Compute the jittered delay for an attempt, given a uniform sample
    /// in `[-1.0, 1.0]` supplied by the caller (callers own their RNG so
    /// this stays deterministic and testable).
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32, unit_sample: f64) -> Duration {
        Jitter(self.jitter).apply(self.delay_for_attempt(attempt), unit_sample)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::from_millis(500, 30_000, 0.2)
    }
}

/// Sample a uniform value in `[-1.0, 1.0]` for jittering a backoff delay.
#[must_use]
pub fn sample_unit_jitter() -> f64 {
    rand::random::<f64>().mul_add(2.0, -1.0)
}
