//! Tunables for the per-server worker loop.

use muxcore_core::BackoffConfig;
use muxcore_transport::TransportLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The protocol method invoked to complete the initialize exchange.
pub const INITIALIZE_METHOD: &str = "initialize";
/// The protocol method invoked for capability discovery once `ready`.
pub const LIST_TOOLS_METHOD: &str = "tools/list";
/// The protocol method used for explicit heartbeat pings.
pub const PING_METHOD: &str = "$/ping";

/// Configuration for one worker's connect/discover/heartbeat/reconnect loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Transport-level limits (connect deadline, outbound high-water mark).
    pub transport_limits: TransportLimits,
    /// Reconnect backoff sequence.
    pub backoff: BackoffConfig,
    /// How long a single `call` (handshake, discovery, heartbeat) may take.
    #[serde(with = "millis")]
    pub call_deadline: Duration,
    /// Interval between heartbeat pings while `ready`.
    #[serde(with = "millis")]
    pub heartbeat_interval: Duration,
    /// Consecutive missed heartbeats before the session is declared closed.
    pub failure_threshold: u32,
    /// How long a session must stay `ready` before a subsequent failure
    /// resets the backoff attempt counter back to zero.
    #[serde(with = "millis")]
    pub stabilization_period: Duration,
    /// How long the breaker stays `open` after a session closes.
    #[serde(with = "millis")]
    pub cooldown: Duration,
    /// Grace period given to in-flight calls during `drain_and_stop`.
    #[serde(with = "millis")]
    pub drain_grace: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transport_limits: TransportLimits::default(),
            backoff: BackoffConfig::default(),
            call_deadline: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(20),
            failure_threshold: 3,
            stabilization_period: Duration::from_secs(60),
            cooldown: Duration::from_secs(15),
            drain_grace: Duration::from_secs(5),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
