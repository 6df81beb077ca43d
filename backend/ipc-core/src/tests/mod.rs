mod calls;
mod retry;

use crate::error::bridge::BridgeError;
use crate::ipc::HostBridge;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use models::StructuredMessage;
use tokio::sync::mpsc;

/// Host stand-in that records every posted payload.
///
/// Reports `Unavailable` for the first `unavailable_for` attempts.
pub(crate) struct RecordingHost {
    posted: mpsc::UnboundedSender<String>,
    unavailable_for: u32,
    attempts: AtomicU32,
}

impl RecordingHost {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::unavailable_for(0)
    }

    pub(crate) fn unavailable_for(attempts: u32) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (posted, receiver) = mpsc::unbounded_channel();
        let host = Arc::new(Self {
            posted,
            unavailable_for: attempts,
            attempts: AtomicU32::new(0),
        });
        (host, receiver)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl HostBridge for RecordingHost {
    fn post_message(&self, payload: &str) -> Result<(), BridgeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.unavailable_for {
            return Err(BridgeError::unavailable("host not ready"));
        }
        let _ = self.posted.send(payload.to_string());
        Ok(())
    }
}

pub(crate) async fn next_posted(receiver: &mut mpsc::UnboundedReceiver<String>) -> StructuredMessage {
    let raw = receiver.recv().await.expect("host channel closed");
    serde_json::from_str(&raw).expect("posted payload is not a structured message")
}
