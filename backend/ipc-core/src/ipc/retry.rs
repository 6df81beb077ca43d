//! Bounded fixed-interval retry over the host's send primitive.

use crate::error::bridge::BridgeError;
use crate::error::ipc::IpcError;

use common::ErrorLocation;

use std::future::Future;
use std::panic::Location;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use log::{debug, warn};

/// How long and how often to wait for the host to become reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// Total attempts, the first one included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

/// Run `attempt` until it succeeds, retrying only while it reports
/// [`BridgeError::Unavailable`].
///
/// Any other bridge failure is final. After `max_attempts` unavailable results the
/// call fails with [`IpcError::Delivery`].
pub(crate) async fn retry_until_available<F, Fut>(
    policy: RetryPolicy,
    method: &str,
    mut attempt: F,
) -> Result<(), IpcError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), BridgeError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = Constant::new(policy.interval);
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match attempt().await {
            Ok(()) => {
                if attempts > 1 {
                    debug!("IPC: Delivered {method} after {attempts} attempts");
                }
                return Ok(());
            }
            Err(e) if e.is_unavailable() => {
                if attempts >= max_attempts {
                    warn!("IPC: Giving up on {method} after {attempts} attempts: {e}");
                    return Err(IpcError::Delivery {
                        message: format!("Host bridge unavailable after {attempts} attempts: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }

                // Constant never runs out; the attempt count above bounds the loop.
                let delay = backoff.next_backoff().unwrap_or(policy.interval);
                debug!("IPC: Host bridge unavailable for {method}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
            Err(other) => {
                warn!("IPC: Delivery of {method} failed: {other}");
                return Err(IpcError::Delivery {
                    message: other.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    }
}
