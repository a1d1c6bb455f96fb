//! Muxcore Events - in-process event bus.
//!
//! Fans out run lifecycle events (step started/finished, approval
//! requested, run status changed) to any number of observers over a
//! broadcast channel. Producers and subscribers never block each other;
//! a subscriber that falls too far behind receives a `Lagged` marker on
//! its next read rather than stalling the bus.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bus;
pub mod event;
pub mod filter;

pub use bus::{EventBus, EventReceiver, Received, DEFAULT_CHANNEL_CAPACITY};
pub use event::{EventCursor, EventKind, RunEvent};
pub use filter::EventFilter;
