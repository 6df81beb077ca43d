//! Bridge auth token with redacted Debug/Display output.

use crate::{ErrorLocation, RedactError};

use std::fmt;
use std::panic::Location;

use serde::ser::Error;
use zeroize::Zeroize;

/// Shared secret a webview presents when it connects to the host bridge.
///
/// The value never shows up in logs, `Debug` output or serialised data, and the
/// backing memory is wiped on drop.
#[derive(Clone)]
pub struct RedactedToken {
    inner: String,
}

impl RedactedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: token.into(),
        }
    }

    /// Raw token value, for handing to the webview that must present it.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Compare a presented token against this one without exposing either.
    ///
    /// Runs over the full length so the comparison time does not depend on the
    /// position of the first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.inner.as_bytes();
        let presented = candidate.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected
            .iter()
            .zip(presented)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedToken([REDACTED])")
    }
}

impl fmt::Display for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED TOKEN]")
    }
}

impl Drop for RedactedToken {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl serde::Serialize for RedactedToken {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::Serialization {
            message: String::from("RedactedToken cannot be serialized - use expose() explicitly"),
            location: ErrorLocation::from(Location::caller()),
        }))
    }
}
