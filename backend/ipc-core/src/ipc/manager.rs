//! One handle over the whole IPC layer.

use crate::config::IpcConfig;
use crate::error::ipc::IpcError;
use crate::ipc::calls::{CallTracker, EventCallback, EventStreamOutcome};
use crate::ipc::dispatcher::{RequestDispatcher, RequestHandler};
use crate::ipc::events::{EventBus, EventHandler};
use crate::ipc::retry::RetryPolicy;
use crate::ipc::router::MessageRouter;
use crate::ipc::transport::{HostBridge, Transport};

use models::StructuredMessage;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// The webview side of the IPC layer.
///
/// Owns the call tracker, event bus, request registry and transport. Clones share
/// all of them. Separate managers are fully independent.
#[derive(Clone)]
pub struct IpcManager {
    calls: CallTracker,
    events: EventBus,
    dispatcher: RequestDispatcher,
    transport: Transport,
    router: MessageRouter,
    default_timeout: Duration,
}

impl IpcManager {
    pub fn new() -> Self {
        Self::with_settings(RetryPolicy::default(), DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_config(config: &IpcConfig) -> Self {
        Self::with_settings(config.retry_policy(), config.default_timeout())
    }

    pub fn with_settings(policy: RetryPolicy, default_timeout: Duration) -> Self {
        let calls = CallTracker::new();
        let events = EventBus::new();
        let dispatcher = RequestDispatcher::new();
        let transport = Transport::new(policy);
        let router = MessageRouter::new(
            calls.clone(),
            events.clone(),
            dispatcher.clone(),
            transport.clone(),
        );

        Self {
            calls,
            events,
            dispatcher,
            transport,
            router,
            default_timeout,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub async fn attach(&self, bridge: Arc<dyn HostBridge>) {
        self.transport.attach(bridge).await;
    }

    /// Drop the host bridge and reject every outstanding call with [`IpcError::Closed`].
    ///
    /// Returns how many calls were rejected.
    pub async fn detach(&self) -> usize {
        self.transport.detach().await;
        let rejected = self.calls.reject_all("IPC transport detached").await;
        if rejected > 0 {
            info!("IPC: Rejected {rejected} pending call(s) on detach");
        }
        rejected
    }

    pub async fn is_attached(&self) -> bool {
        self.transport.is_attached().await
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Call `method` on the host and wait for its response payload.
    ///
    /// `timeout` defaults to the configured call timeout.
    pub async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, IpcError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.calls
            .issue(&self.transport, method, params, timeout, None)
            .await
    }

    /// Call `method`, routing events that carry this call's id to `callback` until
    /// the call settles. Those events are also published on the event bus.
    pub async fn request_with_events(
        &self,
        method: &str,
        params: Value,
        callback: EventCallback,
        timeout: Option<Duration>,
    ) -> Result<EventStreamOutcome, IpcError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.calls
            .issue_with_events(&self.transport, method, params, timeout, callback)
            .await
    }

    /// Send an event to the host, optionally scoped to a request id.
    pub async fn send_event(
        &self,
        method: &str,
        data: Value,
        request_id: Option<String>,
    ) -> Result<(), IpcError> {
        let message = StructuredMessage::event(method, data, request_id);
        self.transport.send(&message).await
    }

    // ------------------------------------------------------------------
    // Event bus
    // ------------------------------------------------------------------

    pub fn on(&self, event: &str, handler: EventHandler) {
        self.events.subscribe(event, handler);
    }

    pub fn off(&self, event: &str, handler: &EventHandler) -> bool {
        self.events.unsubscribe(event, handler)
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.events.subscriber_count(event)
    }

    // ------------------------------------------------------------------
    // Inbound requests
    // ------------------------------------------------------------------

    pub async fn on_request(&self, method: &str, handler: RequestHandler) -> Option<RequestHandler> {
        self.dispatcher.register(method, handler).await
    }

    pub async fn off_request(&self, method: &str) -> bool {
        self.dispatcher.unregister(method).await.is_some()
    }

    pub async fn has_handler(&self, method: &str) -> bool {
        self.dispatcher.contains(method).await
    }

    // ------------------------------------------------------------------
    // Inbound hook
    // ------------------------------------------------------------------

    pub async fn receive(&self, message: StructuredMessage) {
        self.router.route(message).await;
    }

    pub async fn receive_raw(&self, raw: &str) {
        self.router.route_raw(raw).await;
    }

    /// Route every frame from `inbound` in arrival order until the channel closes.
    pub fn spawn_inbound_pump(&self, mut inbound: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        let router = self.router.clone();
        tokio::spawn(async move {
            while let Some(raw) = inbound.recv().await {
                router.route_raw(&raw).await;
            }
            debug!("IPC: Inbound channel closed");
        })
    }

    pub async fn pending_calls(&self) -> usize {
        self.calls.pending_count().await
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

impl Default for IpcManager {
    fn default() -> Self {
        Self::new()
    }
}
