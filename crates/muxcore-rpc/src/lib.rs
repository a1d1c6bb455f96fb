//! Muxcore RPC - JSON-RPC 2.0 semantics over one transport.
//!
//! Every outbound call generates a unique request id, registers a pending
//! entry keyed by that id, and awaits the matching response or a
//! deadline. Inbound messages are dispatched: responses complete pending
//! entries, notifications are queued, and server-initiated requests are
//! rejected unless a handler was registered.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod handler;
pub mod message;
mod pending;
pub mod session;
pub mod state;

pub use error::{RpcError, RpcResult};
pub use handler::ServerRequestHandler;
pub use message::{InboundMessage, RequestId, RpcErrorObject};
pub use session::{NotificationStream, RpcSession};
pub use state::SessionState;
