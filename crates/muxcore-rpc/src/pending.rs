//! The pending-request map: the only state mutated by both the reader
//! (on response) and the writer (on dispatch), per the concurrency model's
//! single-owner discipline. `DashMap` gives us sharded locking so neither
//! side blocks the other beyond a single bucket.

use crate::message::{RequestId, RpcErrorObject};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

pub(crate) type PendingReply = Result<Value, RpcErrorObject>;

/// Tracks outbound calls awaiting a reply.
#[derive(Default)]
pub(crate) struct PendingRequests {
    inner: DashMap<RequestId, oneshot::Sender<PendingReply>>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new pending call, returning the receiver half.
    pub(crate) fn register(&self, id: RequestId) -> oneshot::Receiver<PendingReply> {
        let (tx, rx) = oneshot::channel();
        self.inner.insert(id, tx);
        rx
    }

    /// Complete a pending call with its reply. Returns `false` if no call
    /// was pending under `id` (e.g. it was already abandoned).
    pub(crate) fn complete(&self, id: RequestId, reply: PendingReply) -> bool {
        if let Some((_, tx)) = self.inner.remove(&id) {
            // The receiver may have been dropped if the caller's deadline
            // already fired; sending into a dropped receiver is a no-op.
            let _ = tx.send(reply);
            true
        } else {
            false
        }
    }

    /// Remove a pending call without completing it (the caller abandoned
    /// it, e.g. on cancellation); any late reply is then silently ignored.
    pub(crate) fn abandon(&self, id: RequestId) {
        self.inner.remove(&id);
    }

    /// Fail every pending call with the same reply, used when the session
    /// closes with calls in flight.
    pub(crate) fn fail_all(&self, reply_factory: impl Fn() -> PendingReply) {
        let ids: Vec<RequestId> = self.inner.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.inner.remove(&id) {
                let _ = tx.send(reply_factory());
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}
