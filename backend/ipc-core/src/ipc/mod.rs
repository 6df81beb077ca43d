//! Request/response correlation, event fan-out and request dispatch between a
//! webview and its native host.
//!
//! # Protocol
//!
//! Every message is a JSON [`StructuredMessage`](models::StructuredMessage) with a
//! `type` of `request`, `response` or `event`. Outbound requests get ids
//! `req-1001`, `req-1002`, ...; the host answers each with one `response` carrying
//! the same id. Events may carry the id of an in-flight request.
//!
//! # Architecture
//!
//! - [`Transport`]: serialises and posts messages through a [`HostBridge`], retrying
//!   while the host is unavailable
//! - [`CallTracker`]: pending outbound calls and their timers
//! - [`EventBus`]: name-keyed event subscribers
//! - [`RequestDispatcher`]: inbound request handlers
//! - [`MessageRouter`]: sends each inbound message to one of the above
//! - [`IpcManager`]: the facade tying them together

mod calls;
mod dispatcher;
mod events;
mod manager;
mod responder;
pub(crate) mod retry;
mod router;
mod transport;

pub use calls::{CORRELATION_PREFIX, CallTracker, CleanupHandle, EventCallback, EventStreamOutcome};
pub use dispatcher::{HandlerFuture, RequestDispatcher, RequestHandler};
pub use events::{EventBus, EventHandler};
pub use manager::{DEFAULT_CALL_TIMEOUT, IpcManager};
pub use responder::{EventEmitter, Responder};
pub use retry::RetryPolicy;
pub use router::MessageRouter;
pub use transport::{HostBridge, Transport};
