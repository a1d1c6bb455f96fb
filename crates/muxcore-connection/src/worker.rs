//! The per-`ServerDescriptor` worker: connect, discover, heartbeat,
//! reconnect with backoff, circuit breaker, graceful shutdown.

use crate::config::{ConnectionConfig, INITIALIZE_METHOD, LIST_TOOLS_METHOD, PING_METHOD};
use muxcore_core::{BackoffConfig, Deadline};
use muxcore_registry::{BreakerState, Registry, ServerDescriptor, ToolSchema};
use muxcore_rpc::{RpcSession, SessionState};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Run the worker loop for one server until told to shut down.
///
/// `shutdown_rx` carries `true` once `drain_and_stop` has been called; the
/// worker finishes its current phase, drains any live session with
/// `config.drain_grace`, and returns.
pub async fn run(
    registry: Arc<Registry>,
    descriptor: Arc<ServerDescriptor>,
    config: ConnectionConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let server_id = descriptor.server_id.clone();
    let mut attempt: u32 = 0;

    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        let transport = muxcore_transport::for_spec(descriptor.transport_spec.clone(), config.transport_limits);
        let connect_deadline = Deadline::after(config.transport_limits.connect_deadline);

        let opened = RpcSession::open(server_id.clone(), transport.as_ref(), connect_deadline, None).await;
        let Ok((session, _notifications)) = opened else {
            registry.publish_session(&server_id, None, None);
            if wait_for_retry(&config.backoff, attempt, &mut shutdown_rx).await {
                return;
            }
            attempt += 1;
            continue;
        };

        registry.publish_session(&server_id, Some(session.clone()), Some(SessionState::Handshaking));

        let call_deadline = Deadline::after(config.call_deadline);
        if session.handshake(INITIALIZE_METHOD, None, call_deadline).await.is_err() {
            warn!(server = %server_id, "handshake failed, will reconnect");
            registry.publish_session(&server_id, None, None);
            if wait_for_retry(&config.backoff, attempt, &mut shutdown_rx).await {
                return;
            }
            attempt += 1;
            continue;
        }

        let discovery_deadline = Deadline::after(config.call_deadline);
        match session.call(LIST_TOOLS_METHOD, None, discovery_deadline).await {
            Ok(result) => {
                let schemas = parse_tool_schemas(&server_id, &result);
                registry.commit_discovery(&server_id, schemas);
                registry.update_session_state(&server_id, SessionState::Ready);
                registry.set_breaker(&server_id, BreakerState::Closed);
                info!(server = %server_id, "server ready, capabilities discovered");
            },
            Err(e) => {
                warn!(server = %server_id, error = %e, "capability discovery failed, will reconnect");
                session.close("discovery failed").await;
                registry.publish_session(&server_id, None, None);
                if wait_for_retry(&config.backoff, attempt, &mut shutdown_rx).await {
                    return;
                }
                attempt += 1;
                continue;
            },
        }

        let ready_since = Instant::now();
        let stayed_ready = heartbeat_loop(&registry, &session, &server_id, &config, &mut shutdown_rx).await;

        if *shutdown_rx.borrow() {
            session.drain(config.drain_grace).await;
            registry.publish_session(&server_id, None, None);
            return;
        }

        registry.publish_session(&server_id, None, None);
        registry.set_breaker(&server_id, BreakerState::Open);
        if stayed_ready && ready_since.elapsed() >= config.stabilization_period {
            attempt = 0;
        } else {
            attempt += 1;
        }

        if cooldown_then_close_breaker(&config, &server_id, &registry, &mut shutdown_rx).await {
            return;
        }
    }
}

/// Runs heartbeats while the session is `ready`. Returns `true` if the loop
/// exited because the caller requested shutdown (session stayed healthy up
/// to that point), `false` if it exited because the failure threshold was
/// reached.
async fn heartbeat_loop(
    registry: &Registry,
    session: &RpcSession,
    server_id: &str,
    config: &ConnectionConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        tokio::select! {
            () = tokio::time::sleep(config.heartbeat_interval) => {
                let deadline = Deadline::after(config.call_deadline);
                match session.call(PING_METHOD, None, deadline).await {
                    Ok(_) => {
                        registry.record_heartbeat_success(server_id);
                    },
                    Err(e) => {
                        debug!(server = %server_id, error = %e, "heartbeat missed");
                        registry.record_heartbeat_miss(server_id);
                        let snapshot = registry.snapshot();
                        let misses = snapshot
                            .get(server_id)
                            .map(|entry| entry.health.consecutive_failures)
                            .unwrap_or(config.failure_threshold);
                        if misses >= config.failure_threshold {
                            warn!(server = %server_id, misses, "failure threshold reached, closing session");
                            session.close("heartbeat failure threshold reached").await;
                            return false;
                        }
                    },
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return true;
                }
            }
        }
    }
}

/// Sleep for the backoff delay of `attempt`, waking early if shutdown is
/// requested. Returns `true` if the caller should stop (shutdown fired).
async fn wait_for_retry(backoff: &BackoffConfig, attempt: u32, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    let delay = backoff.jittered_delay(attempt, muxcore_core::retry::sample_unit_jitter());
    tokio::select! {
        () = tokio::time::sleep(delay) => false,
        _ = shutdown_rx.changed() => *shutdown_rx.borrow(),
    }
}

/// Hold the breaker `open` for `config.cooldown`, then flip it back to
/// `closed` so the next connect attempt is allowed to route once `ready`.
/// Returns `true` if shutdown fired during the wait.
async fn cooldown_then_close_breaker(
    config: &ConnectionConfig,
    server_id: &str,
    registry: &Registry,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        () = tokio::time::sleep(config.cooldown) => {
            registry.set_breaker(server_id, BreakerState::HalfOpen);
            false
        },
        _ = shutdown_rx.changed() => *shutdown_rx.borrow(),
    }
}

fn parse_tool_schemas(server_id: &str, result: &serde_json::Value) -> Vec<ToolSchema> {
    let Some(tools) = result.get("tools").and_then(|t| t.as_array()) else {
        return Vec::new();
    };
    tools
        .iter()
        .filter_map(|tool| {
            let tool_name = tool.get("name")?.as_str()?.to_string();
            Some(ToolSchema {
                server_id: server_id.to_string(),
                tool_name,
                input_schema: tool.get("inputSchema").cloned().unwrap_or_else(|| serde_json::json!({})),
                output_schema: tool.get("outputSchema").cloned(),
                description: tool
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string(),
                requires_approval: tool.get("requiresApproval").and_then(serde_json::Value::as_bool).unwrap_or(false),
            })
        })
        .collect()
}
