//! Primitives shared by every crate in the workspace.
//!
//! - [`ErrorLocation`]: call-site capture for located error variants
//! - [`ResponseCode`]: status categories carried by IPC responses
//! - [`RedactedToken`]: bridge auth token that never reaches logs or serialised output

pub mod error;
pub mod redacted_token;
pub mod response_code;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;
pub use response_code::ResponseCode;

#[cfg(test)]
mod tests;
