//! Transport configuration, as loaded from the `servers[].transport` block.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How to reach a tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportSpec {
    /// A child process speaking newline-delimited JSON over stdin/stdout.
    Stdio {
        /// The executable to launch.
        command: String,
        /// Arguments passed to the executable.
        #[serde(default)]
        args: Vec<String>,
        /// Environment variables to set on the child, in addition to the
        /// inherited environment.
        #[serde(default)]
        env: Vec<(String, String)>,
    },
    /// A long-lived bidirectional TCP (optionally TLS) socket speaking
    /// length-prefixed JSON frames.
    Socket {
        /// `host:port` to connect to.
        endpoint: String,
        /// Whether to negotiate TLS after the TCP handshake.
        #[serde(default)]
        tls: bool,
    },
}

/// Settings that govern every transport regardless of concrete kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransportLimits {
    /// How long `open()` waits for the remote before failing with
    /// `TransportUnavailable`.
    #[serde(with = "duration_millis")]
    pub connect_deadline: Duration,
    /// The outbound queue high-water mark; `send` blocks once this many
    /// frames are queued and not yet written to the wire.
    pub outbound_high_water_mark: usize,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            connect_deadline: Duration::from_millis(5_000),
            outbound_high_water_mark: 64,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
