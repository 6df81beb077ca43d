//! Name-keyed fan-out of inbound events.

use crate::error::handler::HandlerError;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use log::{error, trace};
use serde_json::Value;

pub type EventHandler = Arc<dyn Fn(&Value) -> Result<(), HandlerError> + Send + Sync>;

/// Event name to ordered handler list.
///
/// Handlers run in subscription order. Subscribing the same handler twice makes it
/// run twice. Handlers are plain functions and may subscribe or unsubscribe while a
/// publish is running; the running publish keeps its snapshot.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event: &str, handler: EventHandler) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    /// Remove the first registration of exactly this handler. Returns whether one was found.
    pub fn unsubscribe(&self, event: &str, handler: &EventHandler) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(handlers) = subscribers.get_mut(event) else {
            return false;
        };
        let Some(index) = handlers.iter().position(|h| Arc::ptr_eq(h, handler)) else {
            return false;
        };

        handlers.remove(index);
        if handlers.is_empty() {
            subscribers.remove(event);
        }
        true
    }

    /// Invoke every handler for `event`. Returns how many ran without failing.
    pub fn publish(&self, event: &str, data: &Value) -> usize {
        let snapshot: Vec<EventHandler> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned()
            .unwrap_or_default();

        if snapshot.is_empty() {
            trace!("IPC: No subscribers for {event}");
            return 0;
        }

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => error!("IPC: Event handler for {event} failed: {e}"),
                Err(_) => error!("IPC: Event handler for {event} panicked"),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }
}
