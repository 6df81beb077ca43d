use studio_bridge::{APP_DIR_NAME, load_config};
use studio_bridge::error::AppError;
use studio_bridge::handlers::register_builtin_handlers;
use studio_bridge::handoff::BridgeHandoff;
use studio_bridge::logger::{initialize as LoggerInitialize, installed_log_file};

use ipc_core::bridge::start_bridge_server;
use ipc_core::ipc::{HostBridge, IpcManager};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            match serde_json::to_string(&e) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let log_dir = app_dir(dirs::data_local_dir(), "data")?.join("logs");
    create_dir_all(&log_dir).map_err(|e| AppError::Startup {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Studio bridge starting");
    if let Some(log_file) = installed_log_file() {
        info!("Log file: {}", log_file.display());
    }

    let config_dir = app_dir(dirs::config_dir(), "config")?;
    // A broken ipc.json is fatal; a missing one means defaults.
    let config = load_config(&config_dir)?;

    let server = start_bridge_server(&config.bridge, None).await?;
    let handoff = BridgeHandoff::from_server(&server);

    let manager = IpcManager::with_config(&config);
    let bridge: Arc<dyn HostBridge> = server.bridge.clone();
    manager.attach(bridge).await;
    register_builtin_handlers(&manager).await;

    let pump = manager.spawn_inbound_pump(server.inbound);

    let watched = Arc::clone(&server.bridge);
    tokio::spawn(async move {
        watched.wait_for_connection().await;
        match watched.peer() {
            Some(peer) => info!("Webview connected from {peer}"),
            None => info!("Webview connected"),
        }
    });

    info!("Bridge ready at {}", handoff.url);
    println!("{}", handoff.to_json_line()?);

    tokio::signal::ctrl_c().await.map_err(|e| AppError::Startup {
        message: format!("Failed to listen for shutdown signal: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!(
        "Shutdown requested (webview connected: {})",
        server.bridge.is_connected()
    );

    let rejected = manager.detach().await;
    if rejected > 0 {
        warn!("Rejected {rejected} pending call(s) on shutdown");
    }
    server.handle.shutdown().await;
    pump.abort();

    info!("Studio bridge stopped");
    Ok(())
}

/// `{base}/studio-bridge`, created if missing.
#[track_caller]
fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf, AppError> {
    let dir = base
        .ok_or_else(|| AppError::Startup {
            message: format!("No platform {kind} directory available"),
            location: ErrorLocation::from(Location::caller()),
        })?
        .join(APP_DIR_NAME);

    create_dir_all(&dir).map_err(|e| AppError::Startup {
        message: format!("Failed to create {}: {e}", dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    Ok(dir)
}
