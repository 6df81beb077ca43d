//! Connection details handed to the process that launched the bridge.

use crate::error::AppError;

use common::ErrorLocation;

use ipc_core::bridge::BridgeServer;

use std::panic::Location;

use serde::Serialize;

/// What a webview needs to reach the bridge: where to connect and what to present.
///
/// Written once to stdout as a single JSON line. This is the only place the raw
/// token leaves the process.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeHandoff {
    pub url: String,
    pub auth_token: String,
}

impl BridgeHandoff {
    pub fn from_server(server: &BridgeServer) -> Self {
        Self {
            url: server.handle.url(),
            auth_token: server.token.expose().to_owned(),
        }
    }

    #[track_caller]
    pub fn to_json_line(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| AppError::Startup {
            message: format!("Failed to serialize bridge handoff: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
