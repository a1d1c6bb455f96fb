//! Shared harness: fake tool servers played back over in-memory duplex
//! transports, wired into the real `Registry`/`Router`/`ExecutorSupervisor`/
//! `Admission` stack the same way `muxcore-daemon`'s wiring does for a
//! live process — only `muxcore-connection`'s worker loop (connect,
//! reconnect, heartbeat) is bypassed, since these tests drive a session
//! already `ready` rather than exercising reconnection.
//!
//! The fake-server-over-duplex pattern itself is the same one
//! `muxcore_rpc::session_tests` uses to test the session layer alone;
//! here it is reused to stand up a whole server a run can actually
//! dispatch calls against.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use muxcore_admission::Admission;
use muxcore_artefacts::ArtefactStore;
use muxcore_core::Deadline;
use muxcore_events::EventBus;
use muxcore_executor::{ExecutorSupervisor, WorkerConfig};
use muxcore_registry::{BreakerState, Registry, ServerDescriptor, ServerPolicy, ToolSchema};
use muxcore_router::Router;
use muxcore_rpc::SessionState;
use muxcore_store::RunStore;
use muxcore_transport::{Transport, TransportHandle, TransportResult, TransportSpec};
use serde_json::{json, Value};

/// One scripted reply for a tool call a fake server answers.
#[derive(Clone)]
pub enum Scripted {
    /// Reply immediately with this result value.
    Reply(Value),
    /// Reply with a JSON-RPC error object.
    Fail(i64, String),
    /// Never reply - the call runs out its deadline.
    Hang,
}

/// One fake tool server: a fixed tool list plus one scripted reply per
/// tool name.
pub struct FakeServer {
    server_id: String,
    tools: Vec<ToolSchema>,
    scripts: HashMap<String, Scripted>,
}

impl FakeServer {
    #[must_use]
    pub fn new(server_id: &str) -> Self {
        Self { server_id: server_id.to_owned(), tools: Vec::new(), scripts: HashMap::new() }
    }

    #[must_use]
    pub fn with_tool(mut self, tool_name: &str, requires_approval: bool, script: Scripted) -> Self {
        self.tools.push(ToolSchema {
            server_id: self.server_id.clone(),
            tool_name: tool_name.to_owned(),
            input_schema: json!({}),
            output_schema: None,
            description: String::new(),
            requires_approval,
        });
        self.scripts.insert(tool_name.to_owned(), script);
        self
    }
}

/// A transport over one fixed end of an in-memory duplex, the other end
/// already handed to a `play` task. Mirrors
/// `muxcore_rpc::session_tests::DuplexTransport`.
#[derive(Debug)]
struct DuplexTransport {
    far_end: tokio::sync::Mutex<Option<tokio::io::DuplexStream>>,
}

#[async_trait]
impl Transport for DuplexTransport {
    async fn open(&self, _deadline: Deadline) -> TransportResult<TransportHandle> {
        let far = self.far_end.lock().await.take().expect("transport opened twice");
        let (read_half, write_half) = tokio::io::split(far);
        let (stream, sink) = muxcore_transport::framing::ndjson_framed(read_half, write_half);
        Ok(TransportHandle::spawn(stream, sink, 64))
    }
}

/// Play one fake server's script against its near end of a duplex:
/// answers `initialize`/`tools/list`/`$/ping` from the fixed tool list,
/// then one scripted reply per call, until the duplex closes.
async fn play(near: tokio::io::DuplexStream, tools: Vec<ToolSchema>, scripts: HashMap<String, Scripted>) {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    let (read_half, mut write_half) = tokio::io::split(near);
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        let Ok(n) = reader.read_line(&mut line).await else { return };
        if n == 0 {
            return;
        }
        let Ok(req) = serde_json::from_str::<Value>(&line) else { continue };
        let Some(id) = req.get("id").cloned() else { continue };
        let method = req.get("method").and_then(Value::as_str).unwrap_or_default();

        let reply = match method {
            "initialize" => Some(json!({"jsonrpc": "2.0", "id": id, "result": {"protocolVersion": "1.0"}})),
            "tools/list" => {
                let tools_json: Vec<Value> = tools
                    .iter()
                    .map(|t| json!({"name": t.tool_name, "inputSchema": {}, "requiresApproval": t.requires_approval}))
                    .collect();
                Some(json!({"jsonrpc": "2.0", "id": id, "result": {"tools": tools_json}}))
            },
            "$/ping" => Some(json!({"jsonrpc": "2.0", "id": id, "result": {"pong": true}})),
            other => match scripts.get(other) {
                Some(Scripted::Reply(value)) => Some(json!({"jsonrpc": "2.0", "id": id, "result": value})),
                Some(Scripted::Fail(code, message)) => {
                    Some(json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}))
                },
                Some(Scripted::Hang) | None => None,
            },
        };

        let Some(reply) = reply else { continue };
        if write_half.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
            return;
        }
    }
}

/// A fully wired stack, as a deployment's daemon would assemble it, but
/// pointed at fake servers instead of real child processes.
pub struct Stack {
    pub admission: Admission,
    pub store: Arc<RunStore>,
    pub events: Arc<EventBus>,
    pub registry: Arc<Registry>,
}

/// Bring up one `Stack` with every given fake server already connected,
/// handshaken, and discovered - equivalent to what
/// `muxcore_connection::worker::run` does for a real process, minus the
/// reconnect loop this harness has no need to exercise.
pub async fn build_stack(servers: Vec<FakeServer>, worker_config: WorkerConfig) -> Stack {
    let descriptors: Vec<ServerDescriptor> = servers
        .iter()
        .map(|s| ServerDescriptor {
            server_id: s.server_id.clone(),
            transport_spec: TransportSpec::Stdio { command: "true".into(), args: vec![], env: vec![] },
            auth_material_ref: None,
            declared_capabilities: None,
            policy: ServerPolicy::default(),
        })
        .collect();

    let registry = Arc::new(Registry::new(descriptors));

    for server in servers {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let transport = DuplexTransport { far_end: tokio::sync::Mutex::new(Some(far)) };
        let deadline = Deadline::after(Duration::from_secs(2));

        let (session, _notifications) = muxcore_rpc::RpcSession::open(server.server_id.clone(), &transport, deadline, None)
            .await
            .expect("fake transport always opens");

        registry.publish_session(&server.server_id, Some(session.clone()), Some(SessionState::Handshaking));

        tokio::spawn(play(near, server.tools.clone(), server.scripts.clone()));

        session
            .handshake("initialize", None, Deadline::after(Duration::from_secs(2)))
            .await
            .expect("fake server answers initialize");
        session
            .call("tools/list", None, Deadline::after(Duration::from_secs(2)))
            .await
            .expect("fake server answers tools/list");

        registry.commit_discovery(&server.server_id, server.tools.clone());
        registry.update_session_state(&server.server_id, SessionState::Ready);
        registry.set_breaker(&server.server_id, BreakerState::Closed);
    }

    let store = Arc::new(RunStore::connect_memory().await.expect("in-memory run store"));
    let router = Arc::new(Router::new(Arc::clone(&registry)));
    let events = Arc::new(EventBus::new());
    let artefacts = Arc::new(ArtefactStore::connect_memory().await.expect("in-memory artefact store"));
    let supervisor = Arc::new(ExecutorSupervisor::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        router,
        Arc::clone(&events),
        artefacts,
        worker_config,
    ));

    Stack { admission: Admission::new(Arc::clone(&store), supervisor, events.clone()), store, events, registry }
}

/// Poll `f` until it returns `Some`, or panic after `timeout` - avoids
/// fixed `sleep`s racing a worker's async progress across machines of
/// different speed.
pub async fn wait_until<T, Fut>(timeout: Duration, mut f: impl FnMut() -> Fut) -> T
where
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = f().await {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition did not become true within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
