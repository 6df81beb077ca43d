//! Outbound call correlation.
//!
//! Every outbound request gets a fresh `req-<n>` id and a pending entry holding the
//! caller's continuation and a deadline timer. The entry is removed exactly once:
//! by the matching response, by the timer, by [`CleanupHandle::invoke`], or when the
//! transport is detached. Whoever removes it settles the caller; anyone arriving
//! later finds nothing and does nothing.

use crate::error::handler::HandlerError;
use crate::error::ipc::IpcError;
use crate::ipc::transport::Transport;

use common::{ErrorLocation, ResponseCode};
use models::StructuredMessage;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

pub const CORRELATION_PREFIX: &str = "req-";
const CORRELATION_SEED: u64 = 1000;
const REQUEST_FAILED_MESSAGE: &str = "Request failed";

/// Receives `(event_method, data)` for events tied to one in-flight call.
pub type EventCallback = Arc<dyn Fn(&str, &Value) -> Result<(), HandlerError> + Send + Sync>;

type CallResult = Result<Value, IpcError>;

struct PendingCall {
    method: String,
    responder: oneshot::Sender<CallResult>,
    event_callback: Option<EventCallback>,
    timer: JoinHandle<()>,
}

/// Table of outstanding outbound calls.
#[derive(Clone)]
pub struct CallTracker {
    counter: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<String, PendingCall>>>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(CORRELATION_SEED)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Next correlation id. The counter is pre-incremented, so the first id is `req-1001`.
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{CORRELATION_PREFIX}{n}")
    }

    /// Send a request and wait for its response.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Delivery`] / [`IpcError::Codec`] if the request could not be sent.
    ///   No pending entry is left behind.
    /// - [`IpcError::Timeout`] if no response arrived within `timeout`
    /// - [`IpcError::Remote`] if the host answered with a nonzero code
    /// - [`IpcError::Closed`] if the transport was detached first
    pub async fn issue(
        &self,
        transport: &Transport,
        method: &str,
        params: Value,
        timeout: Duration,
        event_callback: Option<EventCallback>,
    ) -> Result<Value, IpcError> {
        let (id, receiver) = self.register(method, timeout, event_callback).await;
        debug!("IPC: Issuing {method} as {id}");

        let request = StructuredMessage::request(id.clone(), method, params);
        if let Err(error) = transport.send(&request).await {
            self.abandon(&id).await;
            return Err(error);
        }

        receiver.await.unwrap_or_else(|_| {
            Err(IpcError::Closed {
                message: format!("Pending call {id} was dropped"),
                location: ErrorLocation::from(Location::caller()),
            })
        })
    }

    /// Like [`CallTracker::issue`], and also returns a handle that retires the id.
    pub async fn issue_with_events(
        &self,
        transport: &Transport,
        method: &str,
        params: Value,
        timeout: Duration,
        event_callback: EventCallback,
    ) -> Result<EventStreamOutcome, IpcError> {
        let (id, receiver) = self.register(method, timeout, Some(event_callback)).await;
        debug!("IPC: Issuing {method} as {id} with event stream");

        let cleanup = CleanupHandle {
            id: id.clone(),
            tracker: self.clone(),
            done: Arc::new(AtomicBool::new(false)),
        };

        let request = StructuredMessage::request(id.clone(), method, params);
        if let Err(error) = transport.send(&request).await {
            cleanup.invoke().await;
            return Err(error);
        }

        match receiver.await {
            Ok(Ok(response)) => Ok(EventStreamOutcome { response, cleanup }),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(IpcError::Closed {
                message: format!("Pending call {id} was dropped"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    async fn register(
        &self,
        method: &str,
        timeout: Duration,
        event_callback: Option<EventCallback>,
    ) -> (String, oneshot::Receiver<CallResult>) {
        let id = self.next_id();
        let (responder, receiver) = oneshot::channel();

        // The timer needs this lock to fire, so it cannot run before the insert.
        let mut pending = self.pending.lock().await;
        let timer = self.arm_timer(id.clone(), timeout);
        pending.insert(
            id.clone(),
            PendingCall {
                method: method.to_string(),
                responder,
                event_callback,
                timer,
            },
        );

        (id, receiver)
    }

    fn arm_timer(&self, id: String, timeout: Duration) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let expired = pending.lock().await.remove(&id);
            if let Some(call) = expired {
                warn!("IPC: {} ({id}) timed out after {timeout:?}", call.method);
                let _ = call.responder.send(Err(IpcError::Timeout {
                    method: call.method,
                    location: ErrorLocation::from(Location::caller()),
                }));
            }
        })
    }

    /// Settle the call `id` with a response from the host.
    ///
    /// Returns `false` when no such call is pending (already settled, timed out or
    /// never issued); the response is then dropped without side effects.
    pub async fn settle(
        &self,
        id: &str,
        code: ResponseCode,
        message: Option<String>,
        data: Value,
    ) -> bool {
        let Some(call) = self.pending.lock().await.remove(id) else {
            debug!("IPC: Dropping response for unknown call {id}");
            return false;
        };
        call.timer.abort();

        let outcome = if code.is_success() {
            Ok(data)
        } else {
            Err(IpcError::Remote {
                code,
                message: message
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| REQUEST_FAILED_MESSAGE.to_string()),
                data,
                location: ErrorLocation::from(Location::caller()),
            })
        };

        if call.responder.send(outcome).is_err() {
            debug!("IPC: Caller of {} ({id}) went away before settling", call.method);
        }
        true
    }

    /// Event callback registered for call `id`, if it is still pending.
    pub async fn event_callback(&self, id: &str) -> Option<EventCallback> {
        self.pending
            .lock()
            .await
            .get(id)
            .and_then(|call| call.event_callback.clone())
    }

    /// Forget call `id` without settling it. Returns whether it was pending.
    pub async fn abandon(&self, id: &str) -> bool {
        match self.pending.lock().await.remove(id) {
            Some(call) => {
                call.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Reject every pending call with [`IpcError::Closed`]. Returns how many there were.
    pub async fn reject_all(&self, reason: &str) -> usize {
        let drained: Vec<(String, PendingCall)> = self.pending.lock().await.drain().collect();
        let count = drained.len();

        for (id, call) in drained {
            call.timer.abort();
            debug!("IPC: Rejecting {} ({id}): {reason}", call.method);
            let _ = call.responder.send(Err(IpcError::Closed {
                message: format!("{}: {reason}", call.method),
                location: ErrorLocation::from(Location::caller()),
            }));
        }

        count
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.pending.lock().await.contains_key(id)
    }
}

impl Default for CallTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a call issued with an event stream.
pub struct EventStreamOutcome {
    pub response: Value,
    pub cleanup: CleanupHandle,
}

/// Retires the correlation id of an event-stream call.
///
/// Once invoked, the call can no longer settle and its id-scoped events reach only
/// the event bus. Invoking it more than once, or after the call settled, does nothing.
#[derive(Clone)]
pub struct CleanupHandle {
    id: String,
    tracker: CallTracker,
    done: Arc<AtomicBool>,
}

impl CleanupHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn invoke(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.tracker.abandon(&self.id).await {
            debug!("IPC: Cleaned up pending call {}", self.id);
        }
    }
}
