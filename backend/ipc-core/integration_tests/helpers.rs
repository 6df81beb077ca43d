//! Test helpers for IPC integration tests.
//!
//! - A scripted host that records what the manager posts
//! - Builders for host-side messages
//! - WebSocket client helpers for the bridge

use ipc_core::bridge::{AuthHandshake, AuthHandshakeResponse};
use ipc_core::error::BridgeError;
use ipc_core::ipc::{HostBridge, IpcManager, RetryPolicy};

use models::StructuredMessage;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub const TEST_AUTH_TOKEN: &str = "test-token-12345";

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Host stand-in recording every payload the manager posts.
pub struct MockHost {
    posted: mpsc::UnboundedSender<String>,
    available: AtomicBool,
    attempts: AtomicU32,
}

impl MockHost {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (posted, receiver) = mpsc::unbounded_channel();
        let host = Arc::new(Self {
            posted,
            available: AtomicBool::new(true),
            attempts: AtomicU32::new(0),
        });
        (host, receiver)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl HostBridge for MockHost {
    fn post_message(&self, payload: &str) -> Result<(), BridgeError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(BridgeError::unavailable("mock host offline"));
        }
        let _ = self.posted.send(payload.to_string());
        Ok(())
    }
}

/// Manager attached to a fresh [`MockHost`].
pub async fn attached_manager() -> (IpcManager, Arc<MockHost>, mpsc::UnboundedReceiver<String>) {
    let manager = IpcManager::with_settings(RetryPolicy::default(), Duration::from_secs(10));
    let (host, posted) = MockHost::new();
    manager.attach(host.clone()).await;
    (manager, host, posted)
}

pub async fn next_posted(posted: &mut mpsc::UnboundedReceiver<String>) -> StructuredMessage {
    let raw = tokio::time::timeout(Duration::from_secs(5), posted.recv())
        .await
        .expect("Timed out waiting for a posted message")
        .expect("Host channel closed");
    serde_json::from_str(&raw).expect("Posted payload is not a structured message")
}

pub fn host_response(id: &str, method: &str, code: i32, message: &str, data: Value) -> String {
    json!({
        "id": id,
        "method": method,
        "type": "response",
        "code": code,
        "message": message,
        "data": data,
    })
    .to_string()
}

pub fn host_event(id: Option<&str>, method: &str, data: Value) -> String {
    json!({
        "id": id,
        "method": method,
        "type": "event",
        "data": data,
    })
    .to_string()
}

pub fn host_request(id: &str, method: &str, params: Value) -> String {
    json!({
        "id": id,
        "method": method,
        "type": "request",
        "params": params,
    })
    .to_string()
}

pub async fn connect_to_bridge(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket bridge");
    ws_stream
}

pub async fn send_text(ws: &mut WsClient, text: String) {
    ws.send(Message::Text(text.into()))
        .await
        .expect("Failed to send frame");
}

pub async fn receive_text(ws: &mut WsClient) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("Timed out waiting for a frame")
        .expect("No frame received")
        .expect("Error receiving frame");
    frame
        .into_text()
        .expect("Expected a text frame")
        .as_str()
        .to_owned()
}

/// Send the auth handshake and return the bridge's answer.
pub async fn authenticate(ws: &mut WsClient, token: &str) -> AuthHandshakeResponse {
    let handshake = AuthHandshake {
        token: token.to_string(),
    };
    send_text(ws, serde_json::to_string(&handshake).expect("encode handshake")).await;
    serde_json::from_str(&receive_text(ws).await).expect("Expected AuthHandshakeResponse")
}

/// Check whether the server closed the connection.
pub async fn is_connection_closed(ws: &mut WsClient) -> bool {
    match tokio::time::timeout(Duration::from_millis(500), ws.next()).await {
        Err(_) => false,
        Ok(None) => true,
        Ok(Some(Ok(Message::Close(_)))) => true,
        Ok(Some(Ok(_))) => false,
        Ok(Some(Err(_))) => true,
    }
}
