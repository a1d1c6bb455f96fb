//! `ServerDescriptor`: the immutable, configuration-derived record of one
//! configured tool server.

use muxcore_transport::TransportSpec;
use serde::{Deserialize, Serialize};

/// Per-server policy settings that ride along with its descriptor.
///
/// Carried here (rather than only in the Router) because the descriptor is
/// the one record created from configuration at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerPolicy {
    /// Token-bucket rate limit, calls per second. `None` means unlimited.
    pub rate_limit_per_sec: Option<f64>,
    /// Maximum burst size for the token bucket.
    #[serde(default = "default_burst")]
    pub rate_limit_burst: u32,
    /// Qualified tool names explicitly permitted on this server. Empty
    /// means "no restriction beyond `deny_tools`".
    #[serde(default)]
    pub allow_tools: Vec<String>,
    /// Qualified tool names explicitly forbidden on this server,
    /// checked before `allow_tools`.
    #[serde(default)]
    pub deny_tools: Vec<String>,
    /// Qualified tool names that require an approval gate regardless of
    /// what the server itself declares at discovery time.
    #[serde(default)]
    pub requires_approval: Vec<String>,
}

fn default_burst() -> u32 {
    1
}

/// A reference to credential material the Connection Manager passes to the
/// transport/session when connecting. Opaque to the registry: it neither
/// parses nor logs this value.
pub type AuthMaterialRef = Option<String>;

/// Configuration-derived description of one tool server.
///
/// Created from the servers config at startup and never mutated; the
/// registry's mutable state (session, schemas, health, breaker) lives
/// alongside it in a [`crate::entry::ServerEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// The operator-chosen name used in qualified tool names.
    pub server_id: String,
    /// How to open a transport to this server.
    pub transport_spec: TransportSpec,
    /// Opaque reference to credential material, if any.
    #[serde(default)]
    pub auth_material_ref: AuthMaterialRef,
    /// Capabilities declared in configuration, ahead of discovery.
    #[serde(default)]
    pub declared_capabilities: Option<Vec<String>>,
    /// Per-server policy settings.
    #[serde(default)]
    pub policy: ServerPolicy,
}
