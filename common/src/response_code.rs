//! Status codes carried in the `code` field of IPC responses.

use serde::{Deserialize, Serialize};

/// Status code of a structured response.
///
/// `0` is success. Every other value is a failure category; the HTTP-like values
/// below are the ones the reply helpers produce, but hosts may send anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseCode(pub i32);

impl ResponseCode {
    pub const SUCCESS: ResponseCode = ResponseCode(0);
    /// Generic handler failure.
    pub const FAILURE: ResponseCode = ResponseCode(1);
    pub const BAD_REQUEST: ResponseCode = ResponseCode(400);
    pub const UNAUTHORIZED: ResponseCode = ResponseCode(401);
    pub const FORBIDDEN: ResponseCode = ResponseCode(403);
    pub const NOT_FOUND: ResponseCode = ResponseCode(404);
    pub const SERVER_ERROR: ResponseCode = ResponseCode(500);

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }
}

impl Default for ResponseCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<i32> for ResponseCode {
    fn from(code: i32) -> Self {
        ResponseCode(code)
    }
}

impl From<ResponseCode> for i32 {
    fn from(code: ResponseCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
