use crate::error::bridge::BridgeError;
use crate::error::ipc::IpcError;
use crate::ipc::RetryPolicy;
use crate::ipc::retry::retry_until_available;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// **VALUE**: Verifies an always-unavailable host is tried exactly `max_attempts` times.
///
/// **WHY THIS MATTERS**: Messages sent before the webview connects rely on this
/// retry window. Too few attempts drops early messages, too many hangs callers.
///
/// **BUG THIS CATCHES**: Would catch off-by-one errors in the attempt count or a
/// missing sleep between attempts.
#[tokio::test(start_paused = true)]
async fn given_unavailable_host_when_retrying_then_gives_up_after_max_attempts() {
    // GIVEN: A host that is never available
    let attempts = AtomicU32::new(0);
    let started = Instant::now();

    // WHEN: Retrying with the default policy
    let result = retry_until_available(RetryPolicy::default(), "getVersion", || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(BridgeError::unavailable("not ready")) }
    })
    .await;

    // THEN: Five attempts, four one-second gaps, then a delivery error
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(started.elapsed() < Duration::from_secs(5));
    match result {
        Err(IpcError::Delivery { message, .. }) => {
            assert!(message.contains("after 5 attempts"), "got: {message}");
            assert!(message.contains("not ready"), "got: {message}");
        }
        other => panic!("Expected Delivery error, got {other:?}"),
    }
}

/// **VALUE**: Verifies delivery succeeds as soon as the host becomes available.
///
/// **BUG THIS CATCHES**: Would catch retrying after success or waiting one interval too many.
#[tokio::test(start_paused = true)]
async fn given_host_ready_on_third_attempt_when_retrying_then_succeeds() {
    let attempts = AtomicU32::new(0);
    let started = Instant::now();

    let result = retry_until_available(RetryPolicy::default(), "ping", || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if attempt < 3 {
                Err(BridgeError::unavailable("not ready"))
            } else {
                Ok(())
            }
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));
}

/// **VALUE**: Verifies failures other than unavailability are not retried.
///
/// **WHY THIS MATTERS**: A broken socket will not heal by waiting; retrying only
/// delays the caller's error.
///
/// **BUG THIS CATCHES**: Would catch the retry loop treating every error as transient.
#[tokio::test(start_paused = true)]
async fn given_send_failure_when_retrying_then_fails_immediately() {
    let attempts = AtomicU32::new(0);

    let result = retry_until_available(RetryPolicy::default(), "ping", || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async {
            Err(BridgeError::Send {
                message: String::from("socket closed"),
                location: ErrorLocation::from(Location::caller()),
            })
        }
    })
    .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    match result {
        Err(IpcError::Delivery { message, .. }) => assert!(message.contains("socket closed")),
        other => panic!("Expected delivery error, got {other:?}"),
    }
}

/// **VALUE**: Verifies a zero attempt budget still tries once.
///
/// **BUG THIS CATCHES**: Would catch a policy of 0 attempts never sending at all.
#[tokio::test(start_paused = true)]
async fn given_zero_max_attempts_when_retrying_then_tries_once() {
    let attempts = AtomicU32::new(0);
    let policy = RetryPolicy {
        interval: Duration::from_millis(10),
        max_attempts: 0,
    };

    let result = retry_until_available(policy, "ping", || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
