//! The read-model `get_run` assembles from durable state.

use muxcore_store::{ApprovalRecord, RunRecord, StepRecord};
use serde::{Deserialize, Serialize};

/// A point-in-time view of a run, for callers that want its full state
/// in one call rather than replaying its event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// The run record itself.
    pub run: RunRecord,
    /// Every step dispatched so far, in ordinal order.
    pub steps: Vec<StepRecord>,
    /// Every approval requested so far, oldest first.
    pub approvals: Vec<ApprovalRecord>,
}
