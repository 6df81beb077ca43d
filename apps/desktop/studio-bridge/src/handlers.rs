//! Requests the bridge process answers itself.
//!
//! | Method       | Answers with                                      |
//! |--------------|---------------------------------------------------|
//! | `getVersion` | `{ "version": "<crate version>" }`                |
//! | `ping`       | `"pong"`                                          |
//! | `echo`       | the request params, after one `onEcho` event      |

use ipc_core::error::HandlerError;
use ipc_core::ipc::{EventEmitter, IpcManager, RequestHandler, Responder};

use log::info;
use serde_json::{Value, json};

pub const GET_VERSION_METHOD: &str = "getVersion";
pub const PING_METHOD: &str = "ping";
pub const ECHO_METHOD: &str = "echo";
pub const ECHO_EVENT: &str = "onEcho";

pub const BUILTIN_METHODS: [&str; 3] = [GET_VERSION_METHOD, PING_METHOD, ECHO_METHOD];

/// Register every built-in handler on `manager`, replacing any existing ones.
pub async fn register_builtin_handlers(manager: &IpcManager) {
    manager
        .on_request(GET_VERSION_METHOD, RequestHandler::sync(get_version))
        .await;
    manager
        .on_request(PING_METHOD, RequestHandler::with_responder(ping))
        .await;
    manager
        .on_request(ECHO_METHOD, RequestHandler::with_events(echo))
        .await;

    info!("IPC: Registered built-in handlers {BUILTIN_METHODS:?}");
}

fn get_version(_params: Value) -> Result<Value, HandlerError> {
    Ok(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn ping(_params: Value, responder: Responder) -> Result<(), HandlerError> {
    responder.success(json!("pong")).await?;
    Ok(())
}

async fn echo(params: Value, responder: Responder, events: EventEmitter) -> Result<(), HandlerError> {
    events.emit(ECHO_EVENT, params.clone()).await?;
    responder.success(params).await?;
    Ok(())
}
