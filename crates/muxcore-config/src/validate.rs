//! Post-parse configuration validation.
//!
//! Everything checkable without a live connection to a tool server is
//! checked here, so a misconfigured daemon fails at startup rather than
//! the first time a run touches the bad reference.

use std::collections::HashSet;

use muxcore_core::QualifiedToolName;

use crate::error::{ConfigError, ConfigResult};
use crate::model::Config;

/// Validate a fully-deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    let server_ids = validate_servers(config)?;
    validate_policy_references(config, &server_ids)?;
    validate_runs(config)?;
    validate_sessions(config)?;
    validate_artefacts(config)?;
    Ok(())
}

fn validate_servers(config: &Config) -> ConfigResult<HashSet<String>> {
    let mut seen = HashSet::with_capacity(config.servers.len());
    for (index, server) in config.servers.iter().enumerate() {
        if server.server_id.is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("servers[{index}].server_id"),
                message: "server_id must not be empty".to_owned(),
            });
        }
        if !seen.insert(server.server_id.clone()) {
            return Err(ConfigError::ValidationError {
                field: format!("servers[{index}].server_id"),
                message: format!("duplicate server_id '{}'", server.server_id),
            });
        }
    }
    Ok(seen)
}

fn validate_policy_references(config: &Config, server_ids: &HashSet<String>) -> ConfigResult<()> {
    for (index, server) in config.servers.iter().enumerate() {
        let policy = &server.policy;
        validate_qualified_names(
            &policy.allow_tools,
            server_ids,
            &format!("servers[{index}].policy.allow_tools"),
        )?;
        validate_qualified_names(
            &policy.deny_tools,
            server_ids,
            &format!("servers[{index}].policy.deny_tools"),
        )?;
        validate_qualified_names(
            &policy.requires_approval,
            server_ids,
            &format!("servers[{index}].policy.requires_approval"),
        )?;

        if let Some(rate) = &policy.rate {
            if !rate.tokens_per_second.is_finite() || rate.tokens_per_second <= 0.0 {
                return Err(ConfigError::ValidationError {
                    field: format!("servers[{index}].policy.rate.tokens_per_second"),
                    message: "tokens_per_second must be a finite positive number".to_owned(),
                });
            }
            if rate.burst == 0 {
                return Err(ConfigError::ValidationError {
                    field: format!("servers[{index}].policy.rate.burst"),
                    message: "burst must be at least 1".to_owned(),
                });
            }
        }
    }
    Ok(())
}

fn validate_qualified_names(
    names: &[String],
    server_ids: &HashSet<String>,
    field: &str,
) -> ConfigResult<()> {
    for name in names {
        let Some(qualified) = QualifiedToolName::parse(name) else {
            return Err(ConfigError::ValidationError {
                field: field.to_owned(),
                message: format!("'{name}' is not a valid qualified tool name ('<server_id>.<tool_name>')"),
            });
        };
        if !server_ids.contains(qualified.server_id.as_str()) {
            return Err(ConfigError::ValidationError {
                field: field.to_owned(),
                message: format!(
                    "'{name}' references unconfigured server_id '{}'",
                    qualified.server_id.as_str()
                ),
            });
        }
    }
    Ok(())
}

fn validate_runs(config: &Config) -> ConfigResult<()> {
    let budgets = &config.runs.default_budgets;
    if budgets.max_steps == 0 {
        return Err(ConfigError::ValidationError {
            field: "runs.default_budgets.max_steps".to_owned(),
            message: "max_steps must be at least 1".to_owned(),
        });
    }
    if budgets.max_wall_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "runs.default_budgets.max_wall_ms".to_owned(),
            message: "max_wall_ms must be at least 1".to_owned(),
        });
    }
    if !budgets.max_cost.is_finite() || budgets.max_cost <= 0.0 {
        return Err(ConfigError::ValidationError {
            field: "runs.default_budgets.max_cost".to_owned(),
            message: "max_cost must be a finite positive number".to_owned(),
        });
    }

    if config.runs.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError {
            field: "runs.retry.max_attempts".to_owned(),
            message: "max_attempts must be at least 1".to_owned(),
        });
    }

    if config.runs.stop.no_progress_threshold == 0 {
        return Err(ConfigError::ValidationError {
            field: "runs.stop.no_progress_threshold".to_owned(),
            message: "no_progress_threshold must be at least 1".to_owned(),
        });
    }

    Ok(())
}

fn validate_sessions(config: &Config) -> ConfigResult<()> {
    let sessions = &config.sessions;
    if sessions.connect_deadline_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "sessions.connect_deadline_ms".to_owned(),
            message: "connect_deadline_ms must be at least 1".to_owned(),
        });
    }
    if sessions.heartbeat_interval_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "sessions.heartbeat_interval_ms".to_owned(),
            message: "heartbeat_interval_ms must be at least 1".to_owned(),
        });
    }
    if sessions.failure_threshold == 0 {
        return Err(ConfigError::ValidationError {
            field: "sessions.failure_threshold".to_owned(),
            message: "failure_threshold must be at least 1".to_owned(),
        });
    }
    Ok(())
}

fn validate_artefacts(config: &Config) -> ConfigResult<()> {
    if config.artefacts.sweep_interval_secs == Some(0) {
        return Err(ConfigError::ValidationError {
            field: "artefacts.sweep_interval_secs".to_owned(),
            message: "sweep_interval_secs must be at least 1, or omitted to disable the sweep".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RateConfig, RetryConfig, RunsConfig, ServerConfigEntry, ServerPolicyConfig, SessionsConfig, StopConfig};
    use muxcore_store::RunBudgets;
    use muxcore_transport::TransportSpec;

    fn base_config() -> Config {
        Config {
            servers: vec![ServerConfigEntry {
                server_id: "fs".to_owned(),
                transport: TransportSpec::Stdio {
                    command: "fs-tools".to_owned(),
                    args: vec![],
                    env: vec![],
                },
                auth_ref: None,
                policy: ServerPolicyConfig::default(),
            }],
            runs: RunsConfig {
                default_budgets: RunBudgets {
                    max_steps: 50,
                    max_wall_ms: 60_000,
                    max_cost: 5.0,
                },
                retry: RetryConfig { max_attempts: 3, base_retry_delay_ms: 250 },
                stop: StopConfig { no_progress_threshold: 3 },
            },
            sessions: SessionsConfig {
                connect_deadline_ms: 5_000,
                heartbeat_interval_ms: 10_000,
                failure_threshold: 3,
                cooldown_ms: 30_000,
            },
            artefacts: crate::model::ArtefactsConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn duplicate_server_id_fails() {
        let mut config = base_config();
        config.servers.push(config.servers[0].clone());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn policy_reference_to_unknown_server_fails() {
        let mut config = base_config();
        config.servers[0].policy.deny_tools = vec!["other.delete".to_owned()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn policy_reference_to_known_server_passes() {
        let mut config = base_config();
        config.servers[0].policy.allow_tools = vec!["fs.read_file".to_owned()];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn malformed_qualified_name_fails() {
        let mut config = base_config();
        config.servers[0].policy.allow_tools = vec!["not-qualified".to_owned()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_max_steps_fails() {
        let mut config = base_config();
        config.runs.default_budgets.max_steps = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_rate_burst_fails() {
        let mut config = base_config();
        config.servers[0].policy.rate = Some(RateConfig { tokens_per_second: 5.0, burst: 0 });
        assert!(validate(&config).is_err());
    }
}
