//! The JSON-RPC session itself: request correlation, deadlines, and the
//! `opening -> handshaking -> ready -> draining -> closed` lifecycle.

use crate::error::{RpcError, RpcResult};
use crate::handler::{METHOD_NOT_FOUND, ServerRequestHandler};
use crate::message::{InboundMessage, RequestId, RpcErrorObject, RpcNotification, RpcRequest, classify};
use crate::pending::PendingRequests;
use crate::state::SessionState;
use muxcore_core::Deadline;
use muxcore_transport::{Transport, TransportHandle};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, trace, warn};

/// A live JSON-RPC 2.0 conversation with one tool server, layered over a
/// single [`muxcore_transport::Transport`].
///
/// Cheaply cloneable: all shared state is `Arc`-wrapped, so clones
/// observe the same pending calls, state, and notification stream.
#[derive(Clone)]
pub struct RpcSession {
    inner: Arc<Inner>,
}

struct Inner {
    server_id: String,
    next_id: AtomicU64,
    pending: PendingRequests,
    state: RwLock<SessionState>,
    transport: Mutex<Option<TransportHandle>>,
    notifications_tx: mpsc::UnboundedSender<(String, Option<Value>)>,
    handler: Option<Arc<dyn ServerRequestHandler>>,
}

/// Notifications queued by the reader for the caller to drain.
pub struct NotificationStream {
    rx: mpsc::UnboundedReceiver<(String, Option<Value>)>,
}

impl NotificationStream {
    /// Receive the next server-initiated notification.
    pub async fn recv(&mut self) -> Option<(String, Option<Value>)> {
        self.rx.recv().await
    }
}

impl RpcSession {
    /// Open a transport and start the session in the `Opening` state, then
    /// immediately transition to `Handshaking` once the transport is live.
    ///
    /// The caller still owes a `handshake()` call to confirm protocol
    /// compatibility and reach `Ready`; until then, `call` fails fast.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::TransportBroken`] if the transport cannot be
    /// opened before `deadline`.
    pub async fn open(
        server_id: impl Into<String>,
        transport: &dyn Transport,
        deadline: Deadline,
        handler: Option<Arc<dyn ServerRequestHandler>>,
    ) -> RpcResult<(Self, NotificationStream)> {
        let server_id = server_id.into();
        let handle = transport
            .open(deadline)
            .await
            .map_err(|e| RpcError::TransportBroken(e.to_string()))?;

        let (notifications_tx, notifications_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            server_id: server_id.clone(),
            next_id: AtomicU64::new(1),
            pending: PendingRequests::new(),
            state: RwLock::new(SessionState::Handshaking),
            transport: Mutex::new(Some(handle)),
            notifications_tx,
            handler,
        });

        let session = Self { inner };
        session.spawn_reader();

        Ok((session, NotificationStream { rx: notifications_rx }))
    }

    fn spawn_reader(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let frame = {
                    let mut guard = inner.transport.lock().await;
                    match guard.as_mut() {
                        Some(handle) => handle.recv().await,
                        None => None,
                    }
                };

                let Some(frame) = frame else {
                    debug!(server = %inner.server_id, "transport reader exhausted, closing session");
                    Self::force_close(&inner, "transport closed").await;
                    break;
                };

                match classify(&frame) {
                    Ok(InboundMessage::Response { id, outcome }) => {
                        if !inner.pending.complete(id, outcome) {
                            trace!(server = %inner.server_id, %id, "late reply for abandoned request ignored");
                        }
                    },
                    Ok(InboundMessage::Notification { method, params }) => {
                        let _ = inner.notifications_tx.send((method, params));
                    },
                    Ok(InboundMessage::PeerRequest { id, method, params }) => {
                        Self::handle_peer_request(&inner, id, method, params).await;
                    },
                    Err(reason) => {
                        warn!(server = %inner.server_id, %reason, "dropping malformed frame");
                    },
                }
            }
        });
    }

    async fn handle_peer_request(inner: &Arc<Inner>, id: RequestId, method: String, params: Option<Value>) {
        let outcome = match &inner.handler {
            Some(handler) => handler.handle(&method, params).await,
            None => Err(RpcErrorObject {
                code: METHOD_NOT_FOUND,
                message: format!("server-initiated method `{method}` has no registered handler"),
                data: None,
            }),
        };

        let body = match outcome {
            Ok(result) => serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(error) => serde_json::json!({"jsonrpc": "2.0", "id": id, "error": error}),
        };

        if let Ok(bytes) = serde_json::to_vec(&body) {
            let guard = inner.transport.lock().await;
            if let Some(handle) = guard.as_ref() {
                let _ = handle.send(bytes).await;
            }
        }
    }

    /// Run the protocol initialize exchange. On success the session moves
    /// to `Ready`; on any failure it moves straight to `Closed`.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`Self::call`] would return for the initialize
    /// method itself.
    pub async fn handshake(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Deadline,
    ) -> RpcResult<Value> {
        match self.call_in_state(method, params, deadline, SessionState::Handshaking).await {
            Ok(result) => {
                *self.inner.state.write().await = SessionState::Ready;
                Ok(result)
            },
            Err(e) => {
                Self::force_close(&self.inner, "handshake failed").await;
                Err(e)
            },
        }
    }

    /// Issue a call and await its reply or the deadline.
    ///
    /// # Errors
    ///
    /// - [`RpcError::SessionClosed`] if the session is not `Ready`.
    /// - [`RpcError::DeadlineExceeded`] if no reply arrives in time.
    /// - [`RpcError::TransportBroken`] if the transport closes while pending.
    /// - [`RpcError::RemoteError`] if the peer replied with a JSON-RPC error.
    pub async fn call(&self, method: &str, params: Option<Value>, deadline: Deadline) -> RpcResult<Value> {
        self.call_in_state(method, params, deadline, SessionState::Ready).await
    }

    async fn call_in_state(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Deadline,
        required: SessionState,
    ) -> RpcResult<Value> {
        {
            let state = *self.inner.state.read().await;
            if state != required {
                return Err(RpcError::SessionClosed(format!(
                    "call attempted in state {state}, required {required}"
                )));
            }
        }

        let id = RequestId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let rx = self.inner.pending.register(id);

        let request = RpcRequest::new(id, method, params);
        let bytes = serde_json::to_vec(&request)
            .map_err(|e| RpcError::ProtocolViolation(format!("failed to encode request: {e}")))?;

        {
            let guard = self.inner.transport.lock().await;
            let Some(handle) = guard.as_ref() else {
                self.inner.pending.abandon(id);
                return Err(RpcError::SessionClosed("transport already closed".into()));
            };
            handle.send(bytes).await.map_err(|e| {
                self.inner.pending.abandon(id);
                RpcError::TransportBroken(e.to_string())
            })?;
        }

        let outcome = tokio::time::timeout(deadline.remaining(), rx).await;
        match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(error_object))) => Err(RpcError::RemoteError(error_object)),
            Ok(Err(_recv_error)) => Err(RpcError::TransportBroken(
                "session closed while call was pending".into(),
            )),
            Err(_timeout) => {
                self.inner.pending.abandon(id);
                self.send_cancellation_notice(id).await;
                Err(RpcError::DeadlineExceeded)
            },
        }
    }

    /// Fire-and-forget; never blocks on a reply.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::SessionClosed`] if the transport has already
    /// closed, or [`RpcError::TransportBroken`] if the write fails.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> RpcResult<()> {
        let notification = RpcNotification::new(method, params);
        let bytes = serde_json::to_vec(&notification)
            .map_err(|e| RpcError::ProtocolViolation(format!("failed to encode notification: {e}")))?;

        let guard = self.inner.transport.lock().await;
        let Some(handle) = guard.as_ref() else {
            return Err(RpcError::SessionClosed("transport already closed".into()));
        };
        handle
            .send(bytes)
            .await
            .map_err(|e| RpcError::TransportBroken(e.to_string()))
    }

    /// Abandon a pending call's id on the local side. If the protocol
    /// defines a cancellation notification the caller should prefer
    /// sending one via [`Self::notify`]; this only stops us waiting.
    async fn send_cancellation_notice(&self, id: RequestId) {
        let params = Some(serde_json::json!({ "requestId": id }));
        if let Err(e) = self.notify("$/cancelRequest", params).await {
            trace!(%id, error = %e, "best-effort cancellation notice failed");
        }
    }

    /// Close the session. All pending calls fail with `SessionClosed`.
    pub async fn close(&self, reason: &str) {
        Self::force_close(&self.inner, reason).await;
    }

    async fn force_close(inner: &Arc<Inner>, reason: &str) {
        let mut state = inner.state.write().await;
        if *state == SessionState::Closed {
            return;
        }
        *state = SessionState::Closed;
        drop(state);

        inner.pending.fail_all(|| {
            Err(RpcErrorObject {
                code: -32099,
                message: format!("session closed: {reason}"),
                data: None,
            })
        });

        if let Some(handle) = inner.transport.lock().await.take() {
            handle.close().await;
        }
    }

    /// The session's current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.inner.state.read().await
    }

    /// Move to `Draining`: no new calls are accepted but in-flight calls
    /// get `grace` to finish before the session is forced closed.
    pub async fn drain(&self, grace: std::time::Duration) {
        {
            let mut state = self.inner.state.write().await;
            if *state == SessionState::Ready {
                *state = SessionState::Draining;
            }
        }
        let deadline = std::time::Instant::now() + grace;
        while std::time::Instant::now() < deadline && self.inner.pending.len() > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        Self::force_close(&self.inner, "drained").await;
    }

    /// Number of calls currently awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }
}

impl std::fmt::Debug for RpcSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSession")
            .field("server_id", &self.inner.server_id)
            .finish_non_exhaustive()
    }
}
