//! Reply and event handles given to inbound request handlers.

use crate::error::ipc::IpcError;
use crate::ipc::transport::Transport;

use common::ResponseCode;
use models::{Reply, StructuredMessage};

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use serde_json::Value;

/// Answers one inbound request.
///
/// Every reply method consumes the responder, so a request is answered at most once.
pub struct Responder {
    request_id: String,
    method: String,
    transport: Transport,
    replied: Arc<AtomicBool>,
}

impl Responder {
    pub(crate) fn new(request_id: String, method: String, transport: Transport) -> Self {
        Self {
            request_id,
            method,
            transport,
            replied: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag the dispatcher reads after the handler finishes.
    pub(crate) fn replied_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.replied)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Send `reply` as the response to this request.
    pub async fn reply(self, reply: Reply) -> Result<(), IpcError> {
        self.replied.store(true, Ordering::SeqCst);
        debug!(
            "IPC: Replying to {} ({}) with code {}",
            self.method,
            self.request_id,
            reply.code()
        );
        let response = StructuredMessage::response(self.request_id, self.method, reply);
        self.transport.send(&response).await
    }

    pub fn success(self, data: Value) -> impl Future<Output = Result<(), IpcError>> + Send {
        self.reply(Reply::success(data))
    }

    pub fn success_with_message(
        self,
        data: Value,
        message: impl Into<String>,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::success_with_message(data, message);
        self.reply(reply)
    }

    pub fn error(
        self,
        message: impl Into<String>,
        code: impl Into<ResponseCode>,
        data: Value,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::error(message, code, data);
        self.reply(reply)
    }

    /// Generic failure, `code = 1` with no payload.
    pub fn failure(
        self,
        message: impl Into<String>,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::failure(message);
        self.reply(reply)
    }

    pub fn not_found(
        self,
        message: impl Into<String>,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::not_found(message);
        self.reply(reply)
    }

    pub fn bad_request(
        self,
        message: impl Into<String>,
        validation_errors: Option<Value>,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::bad_request(message, validation_errors);
        self.reply(reply)
    }

    pub fn unauthorized(
        self,
        message: impl Into<String>,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::unauthorized(message);
        self.reply(reply)
    }

    pub fn forbidden(
        self,
        message: impl Into<String>,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::forbidden(message);
        self.reply(reply)
    }

    pub fn server_error(
        self,
        message: impl Into<String>,
        error: Option<&dyn Display>,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::server_error(message, error);
        self.reply(reply)
    }

    pub fn custom(
        self,
        code: impl Into<ResponseCode>,
        message: impl Into<String>,
        data: Value,
    ) -> impl Future<Output = Result<(), IpcError>> + Send {
        let reply = Reply::custom(code, message, data);
        self.reply(reply)
    }
}

/// Emits events scoped to one inbound request (the event `id` is the request's id).
#[derive(Clone)]
pub struct EventEmitter {
    request_id: String,
    transport: Transport,
}

impl EventEmitter {
    pub(crate) fn new(request_id: String, transport: Transport) -> Self {
        Self {
            request_id,
            transport,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub async fn emit(&self, event: &str, data: Value) -> Result<(), IpcError> {
        let message = StructuredMessage::event(event, data, Some(self.request_id.clone()));
        self.transport.send(&message).await
    }
}
