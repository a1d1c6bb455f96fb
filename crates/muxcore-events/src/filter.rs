//! The subscription filter a caller registers when subscribing.

use muxcore_core::RunId;

/// What a subscriber wants to see.
///
/// An absent `run_id` means "every run"; set it to scope a subscription to
/// one run, the shape `stream_events` needs for the Admission Interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    /// Restrict to events for this run, if set.
    pub run_id: Option<RunId>,
}

impl EventFilter {
    /// A filter matching every run.
    #[must_use]
    pub fn all() -> Self {
        Self { run_id: None }
    }

    /// A filter matching only `run_id`.
    #[must_use]
    pub fn for_run(run_id: RunId) -> Self {
        Self { run_id: Some(run_id) }
    }

    /// Whether `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &crate::event::RunEvent) -> bool {
        match self.run_id {
            Some(run_id) => event.run_id == run_id,
            None => true,
        }
    }
}
