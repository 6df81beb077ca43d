use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a secret-bearing type is asked to serialise itself.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Serialization Error: {message} {location}")]
    Serialization {
        message: String,
        location: ErrorLocation,
    },
}
