//! The event bus: one broadcast channel per process, filtered per
//! subscriber, with per-run sequence numbering.

use crate::event::{EventKind, RunEvent};
use crate::filter::EventFilter;
use muxcore_core::RunId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default channel capacity; a subscriber more than this far behind the
/// fastest producer is declared `Lagged` on its next `recv`.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// In-process fan-out of run events to observers (e.g. an SSE bridge).
///
/// Built on `tokio::sync::broadcast`, with one departure: a lagging
/// subscriber is surfaced a `Lagged(n)` marker
/// rather than transparently skipped, so callers can decide whether to
/// resume from the Run Store's persisted step log. [`EventReceiver::recv`]
/// therefore returns [`Received::Lagged`] instead of looping past it.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<RunEvent>>,
    sequences: Arc<RwLock<HashMap<RunId, u64>>>,
}

impl EventBus {
    /// Build a bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Build a bus with an explicit channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequences: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish one event for `run_id`, stamping the next sequence number
    /// in that run's stream. Returns the number of live subscribers that
    /// received it (`0` is not an error: nobody may be watching).
    pub fn publish(&self, run_id: RunId, kind: EventKind, payload: serde_json::Value) -> usize {
        let sequence = {
            let mut sequences = self.sequences.write().expect("event sequence lock poisoned");
            let next = sequences.entry(run_id).or_insert(0);
            *next += 1;
            *next
        };
        let event = Arc::new(RunEvent {
            run_id,
            at: muxcore_core::now(),
            sequence,
            kind,
            payload,
        });

        trace!(%run_id, %kind, sequence, "publishing event");
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_no_receivers) => 0,
        }
    }

    /// Subscribe, receiving only events matching `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    /// Current number of live subscribers, across every filter.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// One item yielded by [`EventReceiver::recv`].
#[derive(Debug, Clone)]
pub enum Received {
    /// An event matching the subscriber's filter.
    Event(Arc<RunEvent>),
    /// The subscriber fell behind; `n` events (matching or not) were
    /// dropped before it could read them. The caller should consult the
    /// Run Store's persisted step log to recover what it missed.
    Lagged(u64),
}

/// A filtered handle onto the [`EventBus`].
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<RunEvent>>,
    filter: EventFilter,
}

impl EventReceiver {
    /// Receive the next event matching this subscriber's filter, or a
    /// [`Received::Lagged`] marker if events were dropped. Returns `None`
    /// once the bus itself is gone.
    pub async fn recv(&mut self) -> Option<Received> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(Received::Event(event));
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event subscriber lagged, events dropped");
                    return Some(Received::Lagged(n));
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl std::fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_receive_round_trips() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EventFilter::all());
        let run_id = RunId::new();
        bus.publish(run_id, EventKind::StepStarted, serde_json::json!({"ordinal": 1}));

        match rx.recv().await.unwrap() {
            Received::Event(event) => {
                assert_eq!(event.run_id, run_id);
                assert_eq!(event.sequence, 1);
                assert_eq!(event.kind, EventKind::StepStarted);
            },
            Received::Lagged(_) => panic!("unexpected lag"),
        }
    }

    #[tokio::test]
    async fn sequence_is_monotonic_per_run() {
        let bus = EventBus::new();
        let run_id = RunId::new();
        bus.publish(run_id, EventKind::StepStarted, serde_json::json!({}));
        bus.publish(run_id, EventKind::StepFinished, serde_json::json!({}));
        let mut rx = bus.subscribe(EventFilter::for_run(run_id));
        let Received::Event(first) = rx.recv().await.unwrap() else {
            panic!("expected event")
        };
        let Received::Event(second) = rx.recv().await.unwrap() else {
            panic!("expected event")
        };
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
    }

    #[tokio::test]
    async fn filter_excludes_other_runs() {
        let bus = EventBus::new();
        let watched = RunId::new();
        let other = RunId::new();
        let mut rx = bus.subscribe(EventFilter::for_run(watched));
        bus.publish(other, EventKind::StepStarted, serde_json::json!({}));
        bus.publish(watched, EventKind::StepStarted, serde_json::json!({}));

        match rx.recv().await.unwrap() {
            Received::Event(event) => assert_eq!(event.run_id, watched),
            Received::Lagged(_) => panic!("unexpected lag"),
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_a_marker() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe(EventFilter::all());
        let run_id = RunId::new();
        for _ in 0..5 {
            bus.publish(run_id, EventKind::StepStarted, serde_json::json!({}));
        }
        match rx.recv().await.unwrap() {
            Received::Lagged(n) => assert!(n > 0),
            Received::Event(_) => panic!("expected a lag marker"),
        }
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        let count = bus.publish(RunId::new(), EventKind::RunStatusChanged, serde_json::json!({}));
        assert_eq!(count, 0);
    }
}
