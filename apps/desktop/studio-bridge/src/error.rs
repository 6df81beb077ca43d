use common::ErrorLocation;

use ipc_core::error::{BridgeError, ConfigError};

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors that stop the bridge process.
///
/// Serialised onto stderr on fatal exit so the launching host can show a
/// structured reason instead of scraping log text.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum AppError {
    /// Error from this App
    #[error("Startup Error: {message} {location}")]
    Startup {
        message: String,
        location: ErrorLocation,
    },

    /// `ipc.json` could not be read, parsed or validated
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// The WebSocket bridge could not be started
    #[error("Bridge Error: {message} {location}")]
    Bridge {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for AppError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        AppError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<BridgeError> for AppError {
    #[track_caller]
    fn from(error: BridgeError) -> Self {
        AppError::Bridge {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
