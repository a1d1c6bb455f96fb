//! Time handling: a monotonic instant for deadlines plus a wall-clock
//! timestamp for audit trails, per the data model's identifier/time note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A point in time for audit and display purposes.
pub type Timestamp = DateTime<Utc>;

/// Returns the current wall-clock timestamp.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// A deadline expressed against the monotonic clock.
///
/// All awaitable operations in the core (`call`, step dispatch, artefact
/// I/O) accept a `Deadline` rather than a raw `Duration` so that the
/// remaining time can be recomputed at each suspension point without
/// accumulating drift.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// The earlier of two deadlines.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self.at <= other.at { self } else { other }
    }

    /// Time remaining until the deadline, or `Duration::ZERO` if passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has already passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// A simple elapsed-time stopwatch used to populate `Step.started_at` /
/// `finished_at` wall timings and run totals.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Start the stopwatch now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds elapsed since start.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Jitter applied to backoff delays, expressed as a fraction (e.g. `0.2`
/// for ±20%).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Jitter(pub f64);

impl Jitter {
    /// Apply the jitter fraction to a base delay, using the supplied
    /// uniform sample in `[-1.0, 1.0]`.
    #[must_use]
    pub fn apply(self, base: Duration, unit_sample: f64) -> Duration {
        let factor = 1.0 + self.0 * unit_sample.clamp(-1.0, 1.0);
        let millis = (base.as_millis() as f64 * factor.max(0.0)).round();
        Duration::from_millis(millis as u64)
    }
}
