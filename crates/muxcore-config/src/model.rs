//! The on-disk shape of the daemon's configuration file, per spec §6.

use muxcore_artefacts::RetentionPolicy;
use muxcore_registry::{AuthMaterialRef, ServerDescriptor, ServerPolicy};
use muxcore_store::RunBudgets;
use muxcore_transport::TransportSpec;
use serde::{Deserialize, Serialize};

/// Top-level configuration: the daemon's entire startup contract.
///
/// Loaded once, as a single file, and never hot-reloaded — spec §6: "loaded
/// once at startup; reloadable only via full restart."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The tool servers to connect to.
    pub servers: Vec<ServerConfigEntry>,
    /// Defaults applied to every run unless a submission overrides them.
    pub runs: RunsConfig,
    /// Connection Manager timing shared by every server.
    pub sessions: SessionsConfig,
    /// Artefact Store retention policy. Independent of any run's
    /// lifecycle per spec §4.7 and §9's Open Question on retention.
    #[serde(default)]
    pub artefacts: ArtefactsConfig,
}

/// `artefacts:` — policy for the content-addressed blob store, decoupled
/// from run lifecycle per spec §9's Open Question ("retention... defers
/// the policy choice to configuration").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ArtefactsConfig {
    /// How long an artefact survives before it becomes sweep-eligible.
    #[serde(default)]
    pub retention: RetentionPolicy,
    /// How often the background sweep runs. `None` disables the sweep
    /// entirely (artefacts are kept forever regardless of `retention`).
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

/// One entry in `servers:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfigEntry {
    /// The operator-chosen name used in qualified tool names.
    pub server_id: String,
    /// How to reach this server.
    pub transport: TransportSpec,
    /// Opaque reference to credential material, resolved by the caller
    /// before the descriptor reaches the Connection Manager.
    #[serde(default)]
    pub auth_ref: AuthMaterialRef,
    /// Tool allow/deny rules and rate limit for this server.
    #[serde(default)]
    pub policy: ServerPolicyConfig,
}

impl ServerConfigEntry {
    /// Build the immutable [`ServerDescriptor`] the Registry stores for
    /// this server.
    #[must_use]
    pub fn to_descriptor(&self) -> ServerDescriptor {
        ServerDescriptor {
            server_id: self.server_id.clone(),
            transport_spec: self.transport.clone(),
            auth_material_ref: self.auth_ref.clone(),
            declared_capabilities: None,
            policy: self.policy.to_server_policy(),
        }
    }
}

/// `servers[].policy`: which tools this server's client may call, and at
/// what rate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerPolicyConfig {
    /// Qualified tool names (`"<server_id>.<tool_name>"`) explicitly
    /// permitted. Empty means "no restriction beyond `deny_tools`".
    #[serde(default)]
    pub allow_tools: Vec<String>,
    /// Qualified tool names explicitly forbidden, checked before
    /// `allow_tools`.
    #[serde(default)]
    pub deny_tools: Vec<String>,
    /// Token-bucket rate limit for calls into this server.
    #[serde(default)]
    pub rate: Option<RateConfig>,
    /// Qualified tool names that require an approval gate regardless of
    /// what the server itself declares at discovery time.
    #[serde(default)]
    pub requires_approval: Vec<String>,
}

impl ServerPolicyConfig {
    /// Project onto the [`ServerPolicy`] the Registry and Router read:
    /// the rate limit plus the three qualified-tool-name lists, carried
    /// verbatim since the Router enforces them directly against each
    /// call's resolved `server_id`.
    #[must_use]
    pub fn to_server_policy(&self) -> ServerPolicy {
        let (rate_limit_per_sec, rate_limit_burst) = match &self.rate {
            Some(rate) => (Some(rate.tokens_per_second), rate.burst),
            None => (None, ServerPolicy::default().rate_limit_burst),
        };
        ServerPolicy {
            rate_limit_per_sec,
            rate_limit_burst,
            allow_tools: self.allow_tools.clone(),
            deny_tools: self.deny_tools.clone(),
            requires_approval: self.requires_approval.clone(),
        }
    }
}

/// `servers[].policy.rate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateConfig {
    /// Steady-state token refill rate.
    pub tokens_per_second: f64,
    /// Maximum burst size.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_burst() -> u32 {
    1
}

/// `runs:` — defaults applied to every submitted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsConfig {
    /// Budget caps applied unless a submission overrides them.
    pub default_budgets: RunBudgets,
    /// Retry behavior for a failed step.
    pub retry: RetryConfig,
    /// Stall-detection thresholds.
    pub stop: StopConfig,
}

/// `runs.retry`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts for a single step, including the first.
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds.
    pub base_retry_delay_ms: u64,
}

/// `runs.stop`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopConfig {
    /// Consecutive steps with no forward progress before a run is
    /// declared stalled and failed.
    pub no_progress_threshold: u32,
}

/// `sessions:` — Connection Manager timing, shared by every server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// How long `open()` + handshake may take before giving up.
    pub connect_deadline_ms: u64,
    /// Interval between heartbeat pings while a session is ready.
    pub heartbeat_interval_ms: u64,
    /// Consecutive missed heartbeats before a session is declared closed.
    pub failure_threshold: u32,
    /// How long the circuit breaker stays open after a session closes.
    pub cooldown_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_server_policy_projects_all_three_tool_name_lists() {
        let config = ServerPolicyConfig {
            allow_tools: vec!["fs.read".to_owned()],
            deny_tools: vec!["fs.delete".to_owned()],
            rate: Some(RateConfig { tokens_per_second: 2.0, burst: 5 }),
            requires_approval: vec!["fs.write".to_owned()],
        };
        let policy = config.to_server_policy();
        assert_eq!(policy.allow_tools, vec!["fs.read".to_owned()]);
        assert_eq!(policy.deny_tools, vec!["fs.delete".to_owned()]);
        assert_eq!(policy.requires_approval, vec!["fs.write".to_owned()]);
        assert_eq!(policy.rate_limit_per_sec, Some(2.0));
        assert_eq!(policy.rate_limit_burst, 5);
    }

    #[test]
    fn to_server_policy_defaults_burst_when_no_rate_is_configured() {
        let policy = ServerPolicyConfig::default().to_server_policy();
        assert_eq!(policy.rate_limit_per_sec, None);
        assert_eq!(policy.rate_limit_burst, ServerPolicy::default().rate_limit_burst);
    }

    #[test]
    fn to_descriptor_carries_the_projected_policy() {
        let entry = ServerConfigEntry {
            server_id: "fs".to_owned(),
            transport: TransportSpec::Stdio { command: "fs-tools".to_owned(), args: vec![], env: vec![] },
            auth_ref: None,
            policy: ServerPolicyConfig { deny_tools: vec!["fs.delete".to_owned()], ..ServerPolicyConfig::default() },
        };
        let descriptor = entry.to_descriptor();
        assert_eq!(descriptor.policy.deny_tools, vec!["fs.delete".to_owned()]);
    }
}
