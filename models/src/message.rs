//! The structured message envelope exchanged between webview and host.
//!
//! Wire shape (JSON):
//!
//! ```text
//! { id: string|null, method: string, type: "request"|"response"|"event",
//!   params?: object, data?: object, code?: int, message?: string }
//! ```

use crate::error::model_error::ModelError;
use crate::reply::Reply;

use common::{ErrorLocation, ResponseCode};

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator carried in the `type` field.
///
/// Unknown strings are kept verbatim in [`MessageKind::Other`] so the router can log
/// what it discarded. A message with no `type` at all is treated as a request, which
/// is what native hosts have historically sent for plain calls.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Request,
    Response,
    Event,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Request => write!(f, "request"),
            MessageKind::Response => write!(f, "response"),
            MessageKind::Event => write!(f, "event"),
            MessageKind::Other(other) => write!(f, "{other}"),
        }
    }
}

/// One message crossing the webview/host boundary.
///
/// `params` is only meaningful on requests, `data`/`code`/`message` on responses
/// (`data` also on events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredMessage {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub method: String,

    #[serde(rename = "type", default)]
    pub kind: MessageKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ResponseCode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StructuredMessage {
    pub fn request(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id.into()),
            method: method.into(),
            kind: MessageKind::Request,
            params: Some(params),
            data: None,
            code: None,
            message: None,
        }
    }

    /// Response to request `id`. `data` is always present on the wire, `null` when empty.
    pub fn response(id: impl Into<String>, method: impl Into<String>, reply: Reply) -> Self {
        let (code, message, data) = reply.into_parts();
        Self {
            id: Some(id.into()),
            method: method.into(),
            kind: MessageKind::Response,
            params: None,
            data: Some(data),
            code: Some(code),
            message: Some(message),
        }
    }

    /// Event, optionally scoped to the in-flight request `request_id`.
    pub fn event(method: impl Into<String>, data: Value, request_id: Option<String>) -> Self {
        Self {
            id: request_id,
            method: method.into(),
            kind: MessageKind::Event,
            params: None,
            data: Some(data),
            code: None,
            message: None,
        }
    }

    /// Check the fields the declared `type` requires.
    ///
    /// Requests need `id` and `method`, responses need `id`, events need `method`.
    /// Messages of an unrecognised type pass; the router reports those separately.
    #[track_caller]
    pub fn validate(&self) -> Result<(), ModelError> {
        let has_id = self.id.as_deref().is_some_and(|id| !id.is_empty());
        let has_method = !self.method.is_empty();

        let problem = match self.kind {
            MessageKind::Request if !has_id => Some("Request message missing id field"),
            MessageKind::Request if !has_method => Some("Request message missing method field"),
            MessageKind::Response if !has_id => Some("Response message missing id field"),
            MessageKind::Event if !has_method => Some("Event message missing method field"),
            _ => None,
        };

        match problem {
            Some(message) => Err(ModelError::Validation {
                message: String::from(message),
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Ok(()),
        }
    }

    /// Request parameters, defaulting to an empty object like hosts do.
    pub fn params_or_default(&self) -> Value {
        self.params
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// Payload of a response or event, `null` when absent.
    pub fn data_or_null(&self) -> Value {
        self.data.clone().unwrap_or(Value::Null)
    }
}
