//! Health tracking and the circuit breaker state machine.

use muxcore_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Liveness bookkeeping for one server's current session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    /// Wall-clock time of the last observed heartbeat or inferred traffic.
    pub last_heartbeat: Option<Timestamp>,
    /// Consecutive missed heartbeat intervals since the last success.
    pub consecutive_failures: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            last_heartbeat: None,
            consecutive_failures: 0,
        }
    }
}

impl Health {
    /// Record a successful heartbeat or inferred-liveness observation.
    pub fn record_success(&mut self) {
        self.last_heartbeat = Some(muxcore_core::now());
        self.consecutive_failures = 0;
    }

    /// Record a missed heartbeat interval.
    pub fn record_miss(&mut self) {
        self.consecutive_failures += 1;
    }
}

/// The circuit breaker over a server's connectivity.
///
/// `Closed`: calls route normally. `Open`: routing fails fast with
/// `ServerUnavailable` until `reopens_at`. `HalfOpen`: a single reconnect
/// attempt is in flight; success closes the breaker, failure reopens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    /// Normal operation.
    Closed,
    /// Cooling down after `closed` state was declared; no routing.
    Open,
    /// A single reconnect attempt is being trialled.
    HalfOpen,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::Closed
    }
}

impl BreakerState {
    /// Whether routing may currently be attempted to this server.
    #[must_use]
    pub fn allows_routing(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_allows_routing() {
        assert!(BreakerState::Closed.allows_routing());
        assert!(!BreakerState::Open.allows_routing());
        assert!(!BreakerState::HalfOpen.allows_routing());
    }

    #[test]
    fn health_success_resets_failure_count() {
        let mut health = Health::default();
        health.record_miss();
        health.record_miss();
        assert_eq!(health.consecutive_failures, 2);
        health.record_success();
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_heartbeat.is_some());
    }
}
