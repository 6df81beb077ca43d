//! WebSocket server side of the host bridge.

use crate::bridge::connection_state::ConnectionState;
use crate::bridge::handle::BridgeHandle;
use crate::bridge::handshake::{AuthHandshake, AuthHandshakeResponse};
use crate::config::BridgeConfig;
use crate::error::bridge::BridgeError;
use crate::ipc::HostBridge;

use common::{ErrorLocation, RedactedToken};

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use uuid::Uuid;

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

type WsWrite = SplitSink<WebSocketStream<TcpStream>, Message>;

/// The authenticated connection outbound messages go to.
#[derive(Clone)]
struct ActiveConnection {
    id: u64,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<String>,
}

/// [`HostBridge`] backed by the most recently authenticated WebSocket connection.
///
/// Reports [`BridgeError::Unavailable`] while no webview is connected, so the
/// transport keeps retrying until one authenticates.
pub struct WsBridge {
    active: watch::Sender<Option<ActiveConnection>>,
}

impl WsBridge {
    fn new() -> Self {
        let (active, _) = watch::channel(None);
        Self { active }
    }

    pub fn is_connected(&self) -> bool {
        self.active.borrow().is_some()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.active.borrow().as_ref().map(|connection| connection.peer)
    }

    /// Wait until a webview has authenticated.
    pub async fn wait_for_connection(&self) {
        let mut receiver = self.active.subscribe();
        // The sender lives in `self`, so this only ends once a connection exists.
        let _ = receiver.wait_for(Option::is_some).await;
    }

    fn activate(&self, connection: ActiveConnection) {
        let id = connection.id;
        if let Some(previous) = self.active.send_replace(Some(connection)) {
            info!(
                "IPC: Connection {id} replaces connection {} from {}",
                previous.id, previous.peer
            );
        }
    }

    /// Clear the active connection, but only if it is still `id`.
    fn deactivate(&self, id: u64) {
        self.active.send_if_modified(|active| {
            if active.as_ref().is_some_and(|connection| connection.id == id) {
                *active = None;
                true
            } else {
                false
            }
        });
    }
}

impl HostBridge for WsBridge {
    fn post_message(&self, payload: &str) -> Result<(), BridgeError> {
        let active = self.active.borrow().clone();
        match active {
            Some(connection) => connection
                .outbound
                .send(payload.to_string())
                .map_err(|_| BridgeError::unavailable("Webview connection is closing")),
            None => Err(BridgeError::unavailable("No webview connected")),
        }
    }
}

/// A started bridge.
pub struct BridgeServer {
    /// Attach this to an `IpcManager`.
    pub bridge: Arc<WsBridge>,
    pub handle: BridgeHandle,
    /// Raw inbound frames, in arrival order. Feed to `IpcManager::spawn_inbound_pump`.
    pub inbound: mpsc::UnboundedReceiver<String>,
    /// Token the webview must present.
    pub token: RedactedToken,
}

struct ConnectionContext {
    id: u64,
    token: RedactedToken,
    bridge: Arc<WsBridge>,
    inbound: mpsc::UnboundedSender<String>,
    shutdown: watch::Receiver<bool>,
}

/// Start the bridge on `config.bind_host:config.port`.
///
/// A token is generated when `auth_token` is `None`.
///
/// # Errors
///
/// Returns [`BridgeError::Io`] if the port cannot be bound or the bound address is
/// not a loopback address.
pub async fn start_bridge_server(
    config: &BridgeConfig,
    auth_token: Option<RedactedToken>,
) -> Result<BridgeServer, BridgeError> {
    let token = auth_token.unwrap_or_else(|| {
        info!("IPC: Generated bridge auth token");
        RedactedToken::new(Uuid::new_v4().to_string())
    });

    let listener = TcpListener::bind(config.address()).await?;
    let local_addr = listener.local_addr()?;

    if !local_addr.ip().is_loopback() {
        return Err(BridgeError::Io {
            message: format!("Refusing to serve on non-loopback address {local_addr}"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    info!("IPC: Host bridge listening on {local_addr}");

    let bridge = Arc::new(WsBridge::new());
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let accept_task = tokio::spawn(accept_loop(
        listener,
        Arc::clone(&bridge),
        token.clone(),
        inbound_tx,
        shutdown_rx,
    ));

    Ok(BridgeServer {
        bridge,
        handle: BridgeHandle::new(local_addr, shutdown_tx, accept_task),
        inbound: inbound_rx,
        token,
    })
}

async fn accept_loop(
    listener: TcpListener,
    bridge: Arc<WsBridge>,
    token: RedactedToken,
    inbound: mpsc::UnboundedSender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next_id = 0u64;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    next_id += 1;
                    let context = ConnectionContext {
                        id: next_id,
                        token: token.clone(),
                        bridge: Arc::clone(&bridge),
                        inbound: inbound.clone(),
                        shutdown: shutdown.clone(),
                    };
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, context).await {
                            warn!("IPC: Connection from {addr} ended with error: {e}");
                        }
                    });
                }
                Err(e) => error!("IPC: Failed to accept bridge connection: {e}"),
            },
            // Also fires when the handle is dropped.
            _ = shutdown.changed() => break,
        }
    }

    info!("IPC: Host bridge stopped accepting connections");
}

/// Serve one WebSocket connection.
///
/// 1. Drop non-loopback peers
/// 2. Upgrade to WebSocket
/// 3. Require an auth handshake as the first frame
/// 4. Make the connection the active outbound sink
/// 5. Forward inbound text frames until the peer leaves or the bridge shuts down
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    context: ConnectionContext,
) -> Result<(), BridgeError> {
    if !addr.ip().is_loopback() {
        warn!("IPC: Rejected non-loopback connection from {addr}");
        return Ok(());
    }

    let ws_stream = accept_async(stream).await.map_err(|e| BridgeError::Handshake {
        message: format!("WebSocket handshake failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let (mut write, mut read) = ws_stream.split();
    let mut state = ConnectionState::new(context.token.clone());

    let first = match tokio::time::timeout(AUTH_TIMEOUT, read.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(_))) => {
            warn!("IPC: Client {addr} sent non-text first frame");
            return Ok(());
        }
        Ok(Some(Err(e))) => {
            return Err(BridgeError::Read {
                message: format!("Error reading first frame: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(None) => {
            warn!("IPC: Client {addr} disconnected before sending auth");
            return Ok(());
        }
        Err(_) => {
            warn!("IPC: Client {addr} did not authenticate within {AUTH_TIMEOUT:?}");
            return Ok(());
        }
    };

    let handshake: AuthHandshake = match serde_json::from_str(first.as_str()) {
        Ok(handshake) => handshake,
        Err(_) => {
            warn!("IPC: Client {addr} auth failed: first frame was not an auth handshake");
            send_auth_response(&mut write, AuthHandshakeResponse::rejected("Expected auth handshake"))
                .await?;
            return Ok(());
        }
    };

    if !state.validate_token(&handshake.token) {
        warn!("IPC: Client {addr} auth failed: invalid token");
        send_auth_response(
            &mut write,
            AuthHandshakeResponse::rejected("Invalid authentication token"),
        )
        .await?;
        return Err(BridgeError::Auth {
            message: format!("Invalid token from {addr}"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    send_auth_response(&mut write, AuthHandshakeResponse::accepted()).await?;
    info!("IPC: Client {addr} authenticated as connection {}", context.id);

    debug_assert!(state.is_authenticated());
    serve_authenticated(write, read, addr, context).await
}

async fn serve_authenticated(
    write: WsWrite,
    mut read: futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    addr: SocketAddr,
    mut context: ConnectionContext,
) -> Result<(), BridgeError> {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(write, outbound_rx, addr));

    context.bridge.activate(ActiveConnection {
        id: context.id,
        peer: addr,
        outbound: outbound_tx,
    });

    let result = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if context.inbound.send(text.as_str().to_owned()).is_err() {
                        debug!("IPC: Inbound receiver dropped, discarding frame from {addr}");
                    }
                }
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(Message::Binary(_))) => {
                    warn!("IPC: Client {addr} sent a binary frame, ignoring");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    break Err(BridgeError::Read {
                        message: format!("Error reading frame: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            },
            _ = context.shutdown.changed() => break Ok(()),
        }
    };

    // Dropping the active sender ends the writer, which closes the socket.
    context.bridge.deactivate(context.id);
    if let Err(e) = writer.await {
        debug!("IPC: Writer for {addr} ended abnormally: {e}");
    }

    info!("IPC: Client {addr} disconnected");
    result
}

async fn write_loop(mut write: WsWrite, mut outbound: mpsc::UnboundedReceiver<String>, addr: SocketAddr) {
    while let Some(payload) = outbound.recv().await {
        if let Err(e) = write.send(Message::Text(payload.into())).await {
            error!("IPC: Failed to write to {addr}: {e}");
            break;
        }
    }
    let _ = write.close().await;
}

async fn send_auth_response(
    write: &mut WsWrite,
    response: AuthHandshakeResponse,
) -> Result<(), BridgeError> {
    let json = serde_json::to_string(&response).map_err(|e| BridgeError::Send {
        message: format!("Failed to encode auth response: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| BridgeError::Send {
            message: format!("Failed to send auth response: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
