use crate::helpers::{
    TEST_AUTH_TOKEN, authenticate, connect_to_bridge, host_request, is_connection_closed,
    receive_text, send_text,
};

use ipc_core::bridge::{BridgeServer, start_bridge_server};
use ipc_core::config::BridgeConfig;
use ipc_core::error::HandlerError;
use ipc_core::ipc::{IpcManager, RequestHandler, RetryPolicy};

use common::{RedactedToken, ResponseCode};
use models::{MessageKind, StructuredMessage};

use std::time::Duration;

use serde_json::json;

fn test_config() -> BridgeConfig {
    BridgeConfig {
        port: 0,
        bind_host: String::from("127.0.0.1"),
    }
}

async fn start_test_bridge() -> BridgeServer {
    start_bridge_server(&test_config(), Some(RedactedToken::new(TEST_AUTH_TOKEN)))
        .await
        .expect("Failed to start bridge")
}

fn fast_manager() -> IpcManager {
    IpcManager::with_settings(
        RetryPolicy {
            interval: Duration::from_millis(100),
            max_attempts: 50,
        },
        Duration::from_secs(10),
    )
}

/// **VALUE**: Verifies a full round trip: manager call out through the bridge, host
/// answer back in through the inbound pump.
///
/// **WHY THIS MATTERS**: This is the production wiring of the desktop app.
///
/// **BUG THIS CATCHES**: Would catch the authenticated connection not becoming the
/// outbound sink, or inbound frames not reaching the router.
#[tokio::test]
async fn given_authenticated_client_when_manager_calls_then_round_trip_completes() {
    // GIVEN: A bridge attached to a manager with its inbound pump running
    let BridgeServer {
        bridge,
        handle,
        inbound,
        token: _,
    } = start_test_bridge().await;
    let manager = fast_manager();
    manager.attach(bridge.clone()).await;
    let _pump = manager.spawn_inbound_pump(inbound);

    // GIVEN: An authenticated WebSocket client
    let mut ws = connect_to_bridge(&handle.url()).await;
    let auth = authenticate(&mut ws, TEST_AUTH_TOKEN).await;
    assert!(auth.success, "Auth should succeed");
    tokio::time::timeout(Duration::from_secs(5), bridge.wait_for_connection())
        .await
        .expect("Connection never became active");

    // WHEN: The manager calls the host and the client answers
    let call = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request("getVersion", json!({}), None).await })
    };
    let request: StructuredMessage = serde_json::from_str(&receive_text(&mut ws).await).unwrap();
    assert_eq!(request.kind, MessageKind::Request);
    assert_eq!(request.method, "getVersion");

    let response = StructuredMessage::response(
        request.id.expect("request id"),
        "getVersion",
        models::Reply::success(json!({"version": "1.0.0"})),
    );
    send_text(&mut ws, serde_json::to_string(&response).unwrap()).await;

    // THEN: The call resolves with the client's data
    assert_eq!(call.await.unwrap().unwrap(), json!({"version": "1.0.0"}));

    handle.shutdown().await;
}

/// **VALUE**: Verifies host requests arriving over the bridge are answered over it.
#[tokio::test]
async fn given_registered_handler_when_client_sends_request_then_response_frame_returned() {
    let BridgeServer {
        bridge,
        handle,
        inbound,
        token: _,
    } = start_test_bridge().await;
    let manager = fast_manager();
    manager.attach(bridge.clone()).await;
    let _pump = manager.spawn_inbound_pump(inbound);
    manager
        .on_request(
            "echo",
            RequestHandler::with_responder(|params, responder| async move {
                responder.success(params).await?;
                Ok::<(), HandlerError>(())
            }),
        )
        .await;

    let mut ws = connect_to_bridge(&handle.url()).await;
    assert!(authenticate(&mut ws, TEST_AUTH_TOKEN).await.success);

    send_text(&mut ws, host_request("h-1", "echo", json!({"text": "hi"}))).await;
    let response: StructuredMessage = serde_json::from_str(&receive_text(&mut ws).await).unwrap();

    assert_eq!(response.kind, MessageKind::Response);
    assert_eq!(response.id.as_deref(), Some("h-1"));
    assert_eq!(response.code, Some(ResponseCode::SUCCESS));
    assert_eq!(response.data, Some(json!({"text": "hi"})));

    handle.shutdown().await;
}

/// **VALUE**: Verifies a wrong token is refused and the connection closed.
///
/// **WHY THIS MATTERS**: Any local process can reach the port; only the token
/// holder may drive the host.
///
/// **BUG THIS CATCHES**: Would catch a rejected client still becoming the sink.
#[tokio::test]
async fn given_wrong_token_when_authenticating_then_rejected_and_closed() {
    let server = start_test_bridge().await;

    let mut ws = connect_to_bridge(&server.handle.url()).await;
    let auth = authenticate(&mut ws, "wrong-token").await;

    assert!(!auth.success);
    assert_eq!(auth.error.as_deref(), Some("Invalid authentication token"));
    assert!(is_connection_closed(&mut ws).await);
    assert!(!server.bridge.is_connected());
}

/// **VALUE**: Verifies a first frame that is not a handshake is refused.
#[tokio::test]
async fn given_request_before_auth_when_sent_then_rejected() {
    let server = start_test_bridge().await;

    let mut ws = connect_to_bridge(&server.handle.url()).await;
    send_text(&mut ws, host_request("h-1", "getVersion", json!({}))).await;
    let reply: ipc_core::bridge::AuthHandshakeResponse =
        serde_json::from_str(&receive_text(&mut ws).await).unwrap();

    assert!(!reply.success);
    assert!(is_connection_closed(&mut ws).await);
}

/// **VALUE**: Verifies messages sent before the webview connects are delivered
/// once it authenticates.
///
/// **WHY THIS MATTERS**: The app starts issuing calls while the webview is still
/// loading.
///
/// **BUG THIS CATCHES**: Would catch the bridge reporting a hard failure instead of
/// `Unavailable` while no client is connected.
#[tokio::test]
async fn given_no_client_yet_when_event_sent_then_delivered_after_connect() {
    let BridgeServer {
        bridge,
        handle,
        inbound: _,
        token: _,
    } = start_test_bridge().await;
    let manager = fast_manager();
    manager.attach(bridge.clone()).await;

    let send = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .send_event("onReady", json!({"ready": true}), None)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(250)).await;

    let mut ws = connect_to_bridge(&handle.url()).await;
    assert!(authenticate(&mut ws, TEST_AUTH_TOKEN).await.success);

    let event: StructuredMessage = serde_json::from_str(&receive_text(&mut ws).await).unwrap();
    assert_eq!(event.kind, MessageKind::Event);
    assert_eq!(event.method, "onReady");
    assert!(send.await.unwrap().is_ok());

    handle.shutdown().await;
}

/// **VALUE**: Verifies shutdown closes open connections and clears the sink.
#[tokio::test]
async fn given_connected_client_when_shutdown_then_connection_closed() {
    let BridgeServer {
        bridge,
        handle,
        inbound: _inbound,
        token: _,
    } = start_test_bridge().await;
    let mut ws = connect_to_bridge(&handle.url()).await;
    assert!(authenticate(&mut ws, TEST_AUTH_TOKEN).await.success);
    tokio::time::timeout(Duration::from_secs(5), bridge.wait_for_connection())
        .await
        .expect("Connection never became active");

    handle.shutdown().await;

    assert!(is_connection_closed(&mut ws).await);
    assert!(!bridge.is_connected());
}

/// **VALUE**: Verifies a token is generated when none is supplied.
#[tokio::test]
async fn given_no_token_when_started_then_generates_one() {
    let server = start_bridge_server(&test_config(), None).await.unwrap();

    assert!(!server.token.is_empty());
    assert!(server.handle.local_addr().ip().is_loopback());
    assert_ne!(server.handle.local_addr().port(), 0);

    server.handle.shutdown().await;
}
