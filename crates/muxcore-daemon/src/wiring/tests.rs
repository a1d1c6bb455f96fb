//! Wiring tests: the config-to-runtime-handle projections, and a full
//! `start`/`shutdown` round trip against an empty server list so no real
//! tool server is needed.

use std::time::Duration;

use muxcore_config::{ArtefactsConfig, Config, RetryConfig, RunsConfig, SessionsConfig, StopConfig};
use muxcore_store::RunBudgets;

use super::*;

fn sessions_config() -> SessionsConfig {
    SessionsConfig { connect_deadline_ms: 1_500, heartbeat_interval_ms: 9_000, failure_threshold: 4, cooldown_ms: 6_000 }
}

fn config() -> Config {
    Config {
        servers: vec![],
        runs: RunsConfig {
            default_budgets: RunBudgets { max_steps: 20, max_wall_ms: 120_000, max_cost: 5.0 },
            retry: RetryConfig { max_attempts: 5, base_retry_delay_ms: 300 },
            stop: StopConfig { no_progress_threshold: 4 },
        },
        sessions: sessions_config(),
        artefacts: ArtefactsConfig::default(),
    }
}

#[test]
fn connection_config_projects_sessions_fields_and_defaults_the_rest() {
    let cfg = connection_config(&sessions_config());
    assert_eq!(cfg.transport_limits.connect_deadline, Duration::from_millis(1_500));
    assert_eq!(cfg.call_deadline, Duration::from_millis(1_500));
    assert_eq!(cfg.heartbeat_interval, Duration::from_millis(9_000));
    assert_eq!(cfg.failure_threshold, 4);
    assert_eq!(cfg.cooldown, Duration::from_millis(6_000));
    assert_eq!(cfg.drain_grace, ConnectionConfig::default().drain_grace);
    assert_eq!(cfg.stabilization_period, ConnectionConfig::default().stabilization_period);
}

#[test]
fn worker_config_projects_retry_and_stop_fields() {
    let cfg = worker_config(&config());
    assert_eq!(cfg.max_attempts, 5);
    assert_eq!(cfg.base_retry_delay, Duration::from_millis(300));
    assert_eq!(cfg.no_progress_threshold, 4);
}

#[tokio::test]
async fn daemon_starts_and_shuts_down_with_no_configured_servers() {
    let data_dir = tempfile::tempdir().unwrap();
    let daemon = Daemon::start(&config(), data_dir.path()).await.unwrap();
    assert_eq!(daemon.registry.snapshot().version, 0);

    daemon.shutdown(Duration::from_millis(200)).await;
}
