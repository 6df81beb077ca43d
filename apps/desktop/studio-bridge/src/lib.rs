// Library exports for testing
// The binary (main.rs) imports these as well

pub mod error;
pub mod handlers;
pub mod handoff;
pub mod logger;

use crate::error::AppError;

use ipc_core::config::IpcConfig;

use std::path::Path;

/// Directory name used under the platform config and data directories.
pub const APP_DIR_NAME: &str = "studio-bridge";

/// Load `ipc.json` from `config_dir`. A missing file yields defaults; an unreadable
/// or invalid one is an [`AppError::Config`].
#[track_caller]
pub fn load_config(config_dir: &Path) -> Result<IpcConfig, AppError> {
    Ok(IpcConfig::load(config_dir)?)
}

#[cfg(test)]
mod tests;
