//! Per-connection authentication state.

use common::RedactedToken;

/// Tracks whether one bridge connection has presented the right token.
pub(crate) struct ConnectionState {
    authenticated: bool,
    expected_token: RedactedToken,
}

impl ConnectionState {
    pub(crate) fn new(token: RedactedToken) -> Self {
        Self {
            authenticated: false,
            expected_token: token,
        }
    }

    /// Validate token and mark as authenticated if correct.
    pub(crate) fn validate_token(&mut self, token: &str) -> bool {
        if self.expected_token.matches(token) {
            self.authenticated = true;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
