//! Wire-level data for the webview IPC layer.
//!
//! This crate holds pure data: the message envelope and the reply sum type.
//! Routing, correlation and transport live in `ipc-core`.

pub mod error;
pub mod message;
pub mod reply;

pub use error::model_error::ModelError;
pub use message::{MessageKind, StructuredMessage};
pub use reply::Reply;

#[cfg(test)]
mod tests;
