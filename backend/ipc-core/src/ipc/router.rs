//! Routes inbound messages by `type`.

use crate::ipc::calls::CallTracker;
use crate::ipc::dispatcher::RequestDispatcher;
use crate::ipc::events::EventBus;
use crate::ipc::transport::Transport;

use common::ResponseCode;
use models::{MessageKind, StructuredMessage};

use std::panic::{AssertUnwindSafe, catch_unwind};

use futures_util::poll;
use log::{error, trace, warn};
use serde_json::Value;

/// Feeds inbound messages to the call tracker, the event bus or the dispatcher.
///
/// Nothing here fails outward: malformed, unknown or unmatched messages are logged
/// and dropped.
#[derive(Clone)]
pub struct MessageRouter {
    calls: CallTracker,
    events: EventBus,
    dispatcher: RequestDispatcher,
    transport: Transport,
}

impl MessageRouter {
    pub fn new(
        calls: CallTracker,
        events: EventBus,
        dispatcher: RequestDispatcher,
        transport: Transport,
    ) -> Self {
        Self {
            calls,
            events,
            dispatcher,
            transport,
        }
    }

    /// Parse a raw JSON frame and route it.
    pub async fn route_raw(&self, raw: &str) {
        trace!("IPC: <- {raw}");
        match serde_json::from_str::<StructuredMessage>(raw) {
            Ok(message) => self.route(message).await,
            Err(e) => error!("IPC: Failed to parse inbound message: {e}"),
        }
    }

    /// Route one decoded message.
    ///
    /// Request handlers are invoked here, in delivery order, and run until their
    /// first suspension point. Whatever is left of a handler after that continues on
    /// its own task so a slow handler does not hold up the messages behind it.
    /// Responses and events are handled before this returns.
    pub async fn route(&self, message: StructuredMessage) {
        if let Err(e) = message.validate() {
            error!("IPC: Message format error, dropping: {e}");
            return;
        }

        let id = message.id.clone().filter(|id| !id.is_empty());

        match &message.kind {
            MessageKind::Response => {
                let Some(id) = id else {
                    return;
                };
                let code = message.code.unwrap_or(ResponseCode::FAILURE);
                let data = message.data_or_null();
                self.calls.settle(&id, code, message.message, data).await;
            }
            MessageKind::Event => {
                let data = message.data_or_null();
                if let Some(id) = id {
                    self.deliver_to_call(&id, &message.method, &data).await;
                }
                self.events.publish(&message.method, &data);
            }
            MessageKind::Request => {
                let Some(id) = id else {
                    return;
                };
                let params = message.params_or_default();
                let mut pending = self
                    .dispatcher
                    .begin(&self.transport, id, message.method, params)
                    .await;
                if poll!(&mut pending).is_pending() {
                    tokio::spawn(pending);
                }
            }
            MessageKind::Other(kind) => {
                warn!("IPC: Unknown message type {kind:?} for {}, dropping", message.method);
            }
        }
    }

    async fn deliver_to_call(&self, id: &str, method: &str, data: &Value) {
        let Some(callback) = self.calls.event_callback(id).await else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(|| callback(method, data))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("IPC: Event callback for {id} failed on {method}: {e}"),
            Err(_) => error!("IPC: Event callback for {id} panicked on {method}"),
        }
    }
}
