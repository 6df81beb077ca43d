//! Outcome a request handler sends back to the caller.

use common::ResponseCode;

use serde_json::{Value, json};

pub const DEFAULT_SUCCESS_MESSAGE: &str = "success";
pub const DEFAULT_ERROR_MESSAGE: &str = "error";
pub const DEFAULT_NOT_FOUND_MESSAGE: &str = "Resource not found";
pub const DEFAULT_BAD_REQUEST_MESSAGE: &str = "Bad request";
pub const DEFAULT_UNAUTHORIZED_MESSAGE: &str = "Unauthorized";
pub const DEFAULT_FORBIDDEN_MESSAGE: &str = "Forbidden";
pub const DEFAULT_SERVER_ERROR_MESSAGE: &str = "Internal server error";
pub const METHOD_NOT_FOUND_MESSAGE: &str = "Method not found";
pub const PROCESSING_FAILED_MESSAGE: &str = "Processing failed";

/// A structured reply: either success with a payload or an error with a code.
///
/// The named constructors cover the statuses handlers use in practice;
/// [`Reply::custom`] is the escape hatch for anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success {
        message: String,
        data: Value,
    },
    Error {
        code: ResponseCode,
        message: String,
        data: Value,
    },
}

impl Reply {
    pub fn success(data: Value) -> Self {
        Self::success_with_message(data, DEFAULT_SUCCESS_MESSAGE)
    }

    pub fn success_with_message(data: Value, message: impl Into<String>) -> Self {
        Reply::Success {
            message: message.into(),
            data,
        }
    }

    /// Error with an explicit code. A code of `0` still produces [`Reply::Error`];
    /// use [`Reply::custom`] when the code is not known up front.
    pub fn error(message: impl Into<String>, code: impl Into<ResponseCode>, data: Value) -> Self {
        Reply::Error {
            code: code.into(),
            message: message.into(),
            data,
        }
    }

    /// Generic failure (`code = 1`, no payload).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::error(message, ResponseCode::FAILURE, Value::Null)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(message, ResponseCode::NOT_FOUND, Value::Null)
    }

    /// 400, with `{ "validationErrors": ... }` as payload when errors are given.
    pub fn bad_request(message: impl Into<String>, validation_errors: Option<Value>) -> Self {
        let data = validation_errors
            .map(|errors| json!({ "validationErrors": errors }))
            .unwrap_or(Value::Null);
        Self::error(message, ResponseCode::BAD_REQUEST, data)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::error(message, ResponseCode::UNAUTHORIZED, Value::Null)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::error(message, ResponseCode::FORBIDDEN, Value::Null)
    }

    /// 500, with `{ "error": "<stringified error>" }` as payload when an error is given.
    pub fn server_error(message: impl Into<String>, error: Option<&dyn std::fmt::Display>) -> Self {
        let data = error
            .map(|error| json!({ "error": error.to_string() }))
            .unwrap_or(Value::Null);
        Self::error(message, ResponseCode::SERVER_ERROR, data)
    }

    /// Raw reply: `0` maps to success, anything else to an error.
    pub fn custom(code: impl Into<ResponseCode>, message: impl Into<String>, data: Value) -> Self {
        let code = code.into();
        if code.is_success() {
            Self::success_with_message(data, message)
        } else {
            Self::error(message, code, data)
        }
    }

    pub fn code(&self) -> ResponseCode {
        match self {
            Reply::Success { .. } => ResponseCode::SUCCESS,
            Reply::Error { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Reply::Success { message, .. } | Reply::Error { message, .. } => message,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            Reply::Success { data, .. } | Reply::Error { data, .. } => data,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success { .. })
    }

    pub fn into_parts(self) -> (ResponseCode, String, Value) {
        match self {
            Reply::Success { message, data } => (ResponseCode::SUCCESS, message, data),
            Reply::Error {
                code,
                message,
                data,
            } => (code, message, data),
        }
    }
}
