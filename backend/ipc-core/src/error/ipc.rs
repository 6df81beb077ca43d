use common::{ErrorLocation, ResponseCode};

use std::panic::Location;

use serde_json::Value;
use thiserror::Error as ThisError;

/// Failure of an outbound call or of delivering a message to the host.
#[derive(Debug, ThisError)]
pub enum IpcError {
    /// No response arrived before the call's deadline.
    #[error("Request timeout: {method} {location}")]
    Timeout {
        method: String,
        location: ErrorLocation,
    },

    #[error("Delivery Error: {message} {location}")]
    Delivery {
        message: String,
        location: ErrorLocation,
    },

    /// The host answered with a nonzero `code`.
    #[error("Remote Error: [{code}] {message} {location}")]
    Remote {
        code: ResponseCode,
        message: String,
        data: Value,
        location: ErrorLocation,
    },

    #[error("Closed: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Codec Error: {message} {location}")]
    Codec {
        message: String,
        location: ErrorLocation,
    },
}

impl From<serde_json::Error> for IpcError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        IpcError::Codec {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
