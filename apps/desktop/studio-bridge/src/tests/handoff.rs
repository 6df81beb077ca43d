// Handoff line printed for the launching host

use crate::handoff::BridgeHandoff;

use common::RedactedToken;

use ipc_core::bridge::start_bridge_server;
use ipc_core::config::BridgeConfig;

use serde_json::Value;

/// **VALUE**: The handoff line carries the bound URL and the raw token.
///
/// **WHY THIS MATTERS**: The launching host only learns where to connect and what
/// to present from this line. A redacted token here makes every connection fail auth.
///
/// **BUG THIS CATCHES**: Would catch serialising the `RedactedToken` itself (which
/// refuses) or printing the configured port `0` instead of the bound one.
#[tokio::test]
async fn given_started_bridge_when_handoff_serialized_then_contains_bound_url_and_token() {
    // GIVEN: A bridge on an OS-assigned port
    let config = BridgeConfig {
        port: 0,
        bind_host: String::from("127.0.0.1"),
    };
    let server = start_bridge_server(&config, Some(RedactedToken::new("handoff-token")))
        .await
        .unwrap();

    // WHEN
    let line = BridgeHandoff::from_server(&server).to_json_line().unwrap();

    // THEN: One line of camelCase JSON
    assert!(!line.contains('\n'));
    let parsed: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["authToken"], "handoff-token");
    let url = parsed["url"].as_str().unwrap();
    assert_eq!(url, server.handle.url());
    assert!(!url.ends_with(":0"), "url should carry the bound port: {url}");

    server.handle.shutdown().await;
}
