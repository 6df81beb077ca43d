use crate::error::ipc::IpcError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Failure reported by a registered request or event handler.
#[derive(Debug, ThisError)]
pub enum HandlerError {
    #[error("Handler Failed: {message} {location}")]
    Failed {
        message: String,
        location: ErrorLocation,
    },
}

impl HandlerError {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError::Failed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Bare message, without the location suffix. This is what callers see.
    pub fn message(&self) -> &str {
        match self {
            HandlerError::Failed { message, .. } => message,
        }
    }
}

impl From<IpcError> for HandlerError {
    #[track_caller]
    fn from(error: IpcError) -> Self {
        HandlerError::Failed {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        HandlerError::Failed {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
