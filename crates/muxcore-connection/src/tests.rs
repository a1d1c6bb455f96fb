//! Worker loop tests driven against a deliberately unreachable command, so
//! the reconnect/backoff path runs without needing a real tool server.

use crate::config::ConnectionConfig;
use crate::manager::ConnectionManager;
use muxcore_core::BackoffConfig;
use muxcore_registry::{Registry, ServerDescriptor};
use muxcore_transport::{TransportLimits, TransportSpec};
use std::sync::Arc;
use std::time::Duration;

fn unreachable_descriptor() -> ServerDescriptor {
    ServerDescriptor {
        server_id: "ghost".into(),
        transport_spec: TransportSpec::Stdio {
            command: "muxcore-test-binary-that-does-not-exist".into(),
            args: vec![],
            env: vec![],
        },
        auth_material_ref: None,
        declared_capabilities: None,
        policy: Default::default(),
    }
}

fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        transport_limits: TransportLimits {
            connect_deadline: Duration::from_millis(200),
            outbound_high_water_mark: 8,
        },
        backoff: BackoffConfig::from_millis(20, 100, 0.0),
        call_deadline: Duration::from_millis(200),
        heartbeat_interval: Duration::from_millis(200),
        failure_threshold: 2,
        stabilization_period: Duration::from_secs(60),
        cooldown: Duration::from_millis(20),
        drain_grace: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn worker_keeps_server_unavailable_when_spawn_fails() {
    let descriptors = vec![unreachable_descriptor()];
    let registry = Arc::new(Registry::new(descriptors.clone()));
    let manager = ConnectionManager::start(Arc::clone(&registry), descriptors, fast_config());

    tokio::time::sleep(Duration::from_millis(150)).await;

    let err = registry.require_routable("ghost").unwrap_err();
    assert!(matches!(err, muxcore_registry::RegistryError::ServerUnavailable(_)));

    manager.drain_and_stop(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn drain_and_stop_returns_promptly_even_mid_retry() {
    let descriptors = vec![unreachable_descriptor()];
    let registry = Arc::new(Registry::new(descriptors.clone()));
    let manager = ConnectionManager::start(registry, descriptors, fast_config());

    tokio::time::sleep(Duration::from_millis(30)).await;
    let started = tokio::time::Instant::now();
    manager.drain_and_stop(Duration::from_millis(50)).await;
    assert!(started.elapsed() < Duration::from_secs(3));
}
