//! Inbound request handling: registry of handlers and the dispatch boundary.
//!
//! Whatever a handler does, the caller on the host side gets exactly one response:
//! the handler's own reply, `404` when nothing is registered, or a `code = 1`
//! fallback when the handler fails or panics before replying.

use crate::error::handler::HandlerError;
use crate::ipc::responder::{EventEmitter, Responder};
use crate::ipc::transport::Transport;

use models::reply::{METHOD_NOT_FOUND_MESSAGE, PROCESSING_FAILED_MESSAGE};
use models::{Reply, StructuredMessage};

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use log::{debug, error, warn};
use serde_json::Value;
use tokio::sync::RwLock;

pub type HandlerFuture<T> = BoxFuture<'static, Result<T, HandlerError>>;

type ValueFn = dyn Fn(Value) -> HandlerFuture<Value> + Send + Sync;
type ResponderFn = dyn Fn(Value, Responder) -> HandlerFuture<()> + Send + Sync;
type EmitterFn = dyn Fn(Value, Responder, EventEmitter) -> HandlerFuture<()> + Send + Sync;

/// A registered request handler, tagged by how it answers.
#[derive(Clone)]
pub enum RequestHandler {
    /// Returns the response payload; success and failure map to codes `0` and `1`.
    Sync(Arc<ValueFn>),
    /// Answers through a [`Responder`].
    Async(Arc<ResponderFn>),
    /// Answers through a [`Responder`] and may emit events scoped to the request.
    AsyncWithEvents(Arc<EmitterFn>),
}

impl RequestHandler {
    /// Plain function returning the payload directly.
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        RequestHandler::Sync(Arc::new(move |params: Value| -> HandlerFuture<Value> {
            ready(handler(params)).boxed()
        }))
    }

    /// Function returning a future of the payload.
    pub fn future<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        RequestHandler::Sync(Arc::new(move |params: Value| -> HandlerFuture<Value> {
            handler(params).boxed()
        }))
    }

    pub fn with_responder<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value, Responder) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        RequestHandler::Async(Arc::new(
            move |params: Value, responder: Responder| -> HandlerFuture<()> {
                handler(params, responder).boxed()
            },
        ))
    }

    pub fn with_events<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value, Responder, EventEmitter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        RequestHandler::AsyncWithEvents(Arc::new(
            move |params: Value, responder: Responder, emitter: EventEmitter| -> HandlerFuture<()> {
                handler(params, responder, emitter).boxed()
            },
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RequestHandler::Sync(_) => "sync",
            RequestHandler::Async(_) => "async",
            RequestHandler::AsyncWithEvents(_) => "async-with-events",
        }
    }
}

/// Method name to exactly one handler.
#[derive(Clone, Default)]
pub struct RequestDispatcher {
    handlers: Arc<RwLock<HashMap<String, RequestHandler>>>,
}

impl RequestDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`, replacing and returning any previous one.
    pub async fn register(&self, method: &str, handler: RequestHandler) -> Option<RequestHandler> {
        let kind = handler.kind();
        let previous = self
            .handlers
            .write()
            .await
            .insert(method.to_string(), handler);

        match &previous {
            Some(old) => warn!(
                "IPC: Replaced {} handler for {method} with {kind} handler",
                old.kind()
            ),
            None => debug!("IPC: Registered {kind} handler for {method}"),
        }
        previous
    }

    pub async fn unregister(&self, method: &str) -> Option<RequestHandler> {
        let removed = self.handlers.write().await.remove(method);
        if removed.is_some() {
            debug!("IPC: Unregistered handler for {method}");
        }
        removed
    }

    pub async fn lookup(&self, method: &str) -> Option<RequestHandler> {
        self.handlers.read().await.get(method).cloned()
    }

    pub async fn contains(&self, method: &str) -> bool {
        self.handlers.read().await.contains_key(method)
    }

    /// Run the handler for `method` to completion and make sure `id` gets a response.
    pub async fn dispatch(&self, transport: &Transport, id: String, method: String, params: Value) {
        self.begin(transport, id, method, params).await.await;
    }

    /// Look up the handler for `method` and invoke it immediately.
    ///
    /// The handler is called before this returns, so requests routed one after
    /// another start in that order. The returned future awaits the handler and
    /// sends the response; it must be driven for `id` to get one.
    pub async fn begin(
        &self,
        transport: &Transport,
        id: String,
        method: String,
        params: Value,
    ) -> BoxFuture<'static, ()> {
        let transport = transport.clone();

        let Some(handler) = self.lookup(&method).await else {
            warn!("IPC: No handler for {method} ({id})");
            return async move {
                respond(&transport, id, method, Reply::not_found(METHOD_NOT_FOUND_MESSAGE)).await;
            }
            .boxed();
        };

        debug!("IPC: Dispatching {method} ({id}) to {} handler", handler.kind());

        match handler {
            RequestHandler::Sync(handler) => {
                let invoked = invoke(|| handler(params));
                async move {
                    let reply = match complete(invoked).await {
                        Ok(data) => Reply::success(data),
                        Err(e) => {
                            error!("IPC: Handler for {method} ({id}) failed: {e}");
                            Reply::failure(fallback_message(&e))
                        }
                    };
                    respond(&transport, id, method, reply).await;
                }
                .boxed()
            }
            RequestHandler::Async(handler) => {
                let responder = Responder::new(id.clone(), method.clone(), transport.clone());
                let replied = responder.replied_flag();
                let invoked = invoke(|| handler(params, responder));
                async move {
                    let outcome = complete(invoked).await;
                    settle_unreplied(&transport, id, method, outcome, replied.load(Ordering::SeqCst))
                        .await;
                }
                .boxed()
            }
            RequestHandler::AsyncWithEvents(handler) => {
                let responder = Responder::new(id.clone(), method.clone(), transport.clone());
                let emitter = EventEmitter::new(id.clone(), transport.clone());
                let replied = responder.replied_flag();
                let invoked = invoke(|| handler(params, responder, emitter));
                async move {
                    let outcome = complete(invoked).await;
                    settle_unreplied(&transport, id, method, outcome, replied.load(Ordering::SeqCst))
                        .await;
                }
                .boxed()
            }
        }
    }
}

/// Turn a failure into a fallback response unless the handler already replied.
async fn settle_unreplied(
    transport: &Transport,
    id: String,
    method: String,
    outcome: Result<(), HandlerError>,
    replied: bool,
) {
    match outcome {
        Err(e) if replied => {
            error!("IPC: Handler for {method} ({id}) failed after replying: {e}");
        }
        Err(e) => {
            error!("IPC: Handler for {method} ({id}) failed: {e}");
            respond(transport, id, method, Reply::failure(fallback_message(&e))).await;
        }
        Ok(()) if !replied => {
            warn!("IPC: Handler for {method} ({id}) finished without replying");
        }
        Ok(()) => {}
    }
}

/// Call a handler, turning a panic in the call itself into an error.
fn invoke<T>(call: impl FnOnce() -> HandlerFuture<T>) -> Result<HandlerFuture<T>, HandlerError> {
    catch_unwind(AssertUnwindSafe(call))
        .map_err(|panic| HandlerError::new(panic_message(panic.as_ref())))
}

/// Await an invoked handler, turning a panic while polling into an error.
async fn complete<T>(invoked: Result<HandlerFuture<T>, HandlerError>) -> Result<T, HandlerError> {
    let future = invoked?;
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(HandlerError::new(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        PROCESSING_FAILED_MESSAGE.to_string()
    }
}

fn fallback_message(error: &HandlerError) -> String {
    match error.message() {
        "" => PROCESSING_FAILED_MESSAGE.to_string(),
        message => message.to_string(),
    }
}

async fn respond(transport: &Transport, id: String, method: String, reply: Reply) {
    let response = StructuredMessage::response(id, method, reply);
    if let Err(e) = transport.send(&response).await {
        error!(
            "IPC: Failed to deliver response for {} ({:?}): {e}",
            response.method, response.id
        );
    }
}
