use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BridgeError {
    /// No host connection can take the message right now. Senders retry on this.
    #[error("Bridge Unavailable: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handshake Error: {message} {location}")]
    Handshake {
        message: String,
        location: ErrorLocation,
    },

    #[error("Auth Error: {message} {location}")]
    Auth {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl BridgeError {
    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        BridgeError::Unavailable {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, BridgeError::Unavailable { .. })
    }
}

impl From<IoError> for BridgeError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        BridgeError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
