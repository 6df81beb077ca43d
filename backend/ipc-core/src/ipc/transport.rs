//! Outbound delivery to the host and the seam a host plugs into.

use crate::error::bridge::BridgeError;
use crate::error::ipc::IpcError;
use crate::ipc::retry::{RetryPolicy, retry_until_available};

use models::StructuredMessage;

use std::sync::Arc;

use log::{info, trace};
use tokio::sync::RwLock;

/// The host's messaging primitive.
///
/// Implementations hand one serialised message to the host and return without
/// waiting for any answer. Return [`BridgeError::Unavailable`] when the host cannot
/// take messages yet; the transport retries those.
pub trait HostBridge: Send + Sync {
    fn post_message(&self, payload: &str) -> Result<(), BridgeError>;
}

/// Serialises outbound messages and posts them through the attached [`HostBridge`].
///
/// Cloning is cheap; all clones share the attached bridge.
#[derive(Clone)]
pub struct Transport {
    bridge: Arc<RwLock<Option<Arc<dyn HostBridge>>>>,
    policy: RetryPolicy,
}

impl Transport {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            bridge: Arc::new(RwLock::new(None)),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Attach a bridge, replacing any previous one.
    pub async fn attach(&self, bridge: Arc<dyn HostBridge>) {
        let previous = self.bridge.write().await.replace(bridge);
        if previous.is_some() {
            info!("IPC: Replaced attached host bridge");
        } else {
            info!("IPC: Host bridge attached");
        }
    }

    /// Returns whether a bridge was attached.
    pub async fn detach(&self) -> bool {
        let previous = self.bridge.write().await.take();
        if previous.is_some() {
            info!("IPC: Host bridge detached");
        }
        previous.is_some()
    }

    pub async fn is_attached(&self) -> bool {
        self.bridge.read().await.is_some()
    }

    /// Serialise `message` and deliver it, retrying while the host is unavailable.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Codec`] if the message cannot be serialised
    /// - [`IpcError::Delivery`] if the host stays unavailable or rejects the message
    pub async fn send(&self, message: &StructuredMessage) -> Result<(), IpcError> {
        let payload = serde_json::to_string(message)?;
        trace!("IPC: -> {payload}");

        let payload = payload.as_str();
        retry_until_available(self.policy, &message.method, move || self.try_post(payload)).await
    }

    async fn try_post(&self, payload: &str) -> Result<(), BridgeError> {
        // Clone out so the lock is not held while the host runs.
        let bridge = self.bridge.read().await.clone();
        match bridge {
            Some(bridge) => bridge.post_message(payload),
            None => Err(BridgeError::unavailable("No host bridge attached")),
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
