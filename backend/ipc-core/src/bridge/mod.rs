//! WebSocket host bridge.
//!
//! Serves one loopback WebSocket endpoint that a webview connects to. It plays the
//! host's role for an [`IpcManager`](crate::ipc::IpcManager): outbound messages are
//! written to the active connection, inbound text frames go to the manager's
//! inbound pump.
//!
//! # Security
//!
//! - Binds to a loopback address only (checked by config validation)
//! - Non-loopback peers are dropped without a response
//! - The first frame must be an auth handshake carrying the bridge token

pub(crate) mod connection_state;
mod handle;
pub mod handshake;
mod server;

pub use handle::BridgeHandle;
pub use handshake::{AuthHandshake, AuthHandshakeResponse};
pub use server::{BridgeServer, WsBridge, start_bridge_server};
