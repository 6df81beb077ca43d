//! Lifecycle handle of a running bridge server.

use std::net::SocketAddr;

use log::{debug, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to the bridge's accept loop.
///
/// [`BridgeHandle::shutdown`] stops accepting and closes every open connection.
/// Dropping the handle does the same without waiting for the accept loop to end.
pub struct BridgeHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl BridgeHandle {
    pub(crate) fn new(
        local_addr: SocketAddr,
        shutdown: watch::Sender<bool>,
        accept_task: JoinHandle<()>,
    ) -> Self {
        Self {
            local_addr,
            shutdown,
            accept_task,
        }
    }

    /// Address actually bound, useful when the configured port was `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    pub async fn shutdown(self) {
        info!("IPC: Shutting down host bridge on {}", self.local_addr);
        self.shutdown.send_replace(true);
        if let Err(e) = self.accept_task.await {
            debug!("IPC: Bridge accept loop ended abnormally: {e}");
        }
    }
}
