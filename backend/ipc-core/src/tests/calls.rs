use crate::error::handler::HandlerError;
use crate::error::ipc::IpcError;
use crate::ipc::{CallTracker, RetryPolicy, Transport};
use crate::tests::{RecordingHost, next_posted};

use common::ResponseCode;
use models::MessageKind;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const LONG: Duration = Duration::from_secs(10);

async fn attached_transport() -> (Transport, mpsc::UnboundedReceiver<String>) {
    let transport = Transport::default();
    let (host, posted) = RecordingHost::new();
    transport.attach(host).await;
    (transport, posted)
}

fn spawn_call(
    tracker: &CallTracker,
    transport: &Transport,
    method: &'static str,
    timeout: Duration,
) -> JoinHandle<Result<Value, IpcError>> {
    let tracker = tracker.clone();
    let transport = transport.clone();
    tokio::spawn(async move { tracker.issue(&transport, method, json!({}), timeout, None).await })
}

/// **VALUE**: Verifies correlation ids start at `req-1001` and increase.
///
/// **WHY THIS MATTERS**: Hosts and logs rely on this id format to pair requests
/// with responses.
///
/// **BUG THIS CATCHES**: Would catch post-increment (`req-1000`) or a changed prefix.
#[tokio::test]
async fn given_new_tracker_when_calls_issued_then_ids_start_at_1001() {
    // GIVEN: A fresh tracker and an attached host
    let tracker = CallTracker::new();
    let (transport, mut posted) = attached_transport().await;

    // WHEN: Two calls are issued
    let _first = spawn_call(&tracker, &transport, "a", LONG);
    let first = next_posted(&mut posted).await;
    let _second = spawn_call(&tracker, &transport, "b", LONG);
    let second = next_posted(&mut posted).await;

    // THEN: Ids are sequential from 1001 and the messages are requests
    assert_eq!(first.id.as_deref(), Some("req-1001"));
    assert_eq!(second.id.as_deref(), Some("req-1002"));
    assert_eq!(first.kind, MessageKind::Request);
    assert_eq!(first.params, Some(json!({})));
    assert_eq!(tracker.pending_count().await, 2);
}

/// **VALUE**: Verifies a success response resolves the call with its data.
///
/// **BUG THIS CATCHES**: Would catch the response payload being dropped or the
/// pending entry surviving settlement.
#[tokio::test]
async fn given_pending_call_when_success_response_then_resolves_with_data() {
    let tracker = CallTracker::new();
    let (transport, mut posted) = attached_transport().await;

    let call = spawn_call(&tracker, &transport, "getVersion", LONG);
    let request = next_posted(&mut posted).await;
    let id = request.id.expect("request id");

    let settled = tracker
        .settle(&id, ResponseCode::SUCCESS, Some(String::from("success")), json!({"version": "1.0.0"}))
        .await;

    assert!(settled);
    assert_eq!(call.await.unwrap().unwrap(), json!({"version": "1.0.0"}));
    assert!(!tracker.contains(&id).await);
}

/// **VALUE**: Verifies an error response rejects with code, message and data.
///
/// **WHY THIS MATTERS**: Callers show the host's message and branch on its code.
///
/// **BUG THIS CATCHES**: Would catch error payloads being lost or an empty message
/// surfacing instead of the generic one.
#[tokio::test]
async fn given_pending_call_when_error_response_then_rejects_with_remote_error() {
    let tracker = CallTracker::new();
    let (transport, mut posted) = attached_transport().await;

    let call = spawn_call(&tracker, &transport, "upload", LONG);
    let id = next_posted(&mut posted).await.id.expect("request id");

    tracker
        .settle(&id, ResponseCode(500), None, json!({"error": "disk full"}))
        .await;

    match call.await.unwrap() {
        Err(IpcError::Remote {
            code,
            message,
            data,
            ..
        }) => {
            assert_eq!(code, ResponseCode(500));
            assert_eq!(message, "Request failed");
            assert_eq!(data, json!({"error": "disk full"}));
        }
        other => panic!("Expected remote error, got {other:?}"),
    }
}

/// **VALUE**: Verifies a response for an unknown id changes nothing.
///
/// **BUG THIS CATCHES**: Would catch an unmatched response settling some other call.
#[tokio::test]
async fn given_unknown_id_when_response_arrives_then_no_effect() {
    let tracker = CallTracker::new();
    let (transport, mut posted) = attached_transport().await;

    let _call = spawn_call(&tracker, &transport, "a", LONG);
    let id = next_posted(&mut posted).await.id.expect("request id");

    let settled = tracker
        .settle("req-9999", ResponseCode::SUCCESS, None, Value::Null)
        .await;

    assert!(!settled);
    assert!(tracker.contains(&id).await);
    assert_eq!(tracker.pending_count().await, 1);
}

/// **VALUE**: Verifies a call without a response times out and is forgotten.
///
/// **WHY THIS MATTERS**: A host that never answers must not leak pending entries
/// or hang callers forever.
///
/// **BUG THIS CATCHES**: Would catch a timer that rejects but leaves the entry, or
/// a late response still being accepted.
#[tokio::test(start_paused = true)]
async fn given_no_response_when_timeout_elapses_then_rejects_with_method_name() {
    // GIVEN: A call with a short deadline and a silent host
    let tracker = CallTracker::new();
    let (transport, _posted) = attached_transport().await;

    // WHEN: The deadline passes
    let result = tracker
        .issue(&transport, "slowOp", json!({}), Duration::from_millis(50), None)
        .await;

    // THEN: Timeout naming the method, nothing left pending
    let error = result.expect_err("call should time out");
    assert!(matches!(error, IpcError::Timeout { .. }));
    assert!(error.to_string().contains("slowOp"));
    assert_eq!(tracker.pending_count().await, 0);

    // THEN: A late response is ignored
    assert!(!tracker.settle("req-1001", ResponseCode::SUCCESS, None, Value::Null).await);
}

/// **VALUE**: Verifies a response cancels the timer.
///
/// **BUG THIS CATCHES**: Would catch a timer that still fires after settlement and
/// panics or double-settles.
#[tokio::test(start_paused = true)]
async fn given_settled_call_when_deadline_passes_then_nothing_happens() {
    let tracker = CallTracker::new();
    let (transport, mut posted) = attached_transport().await;

    let call = spawn_call(&tracker, &transport, "quick", Duration::from_millis(100));
    let id = next_posted(&mut posted).await.id.expect("request id");
    tracker.settle(&id, ResponseCode::SUCCESS, None, json!(1)).await;

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(call.await.unwrap().unwrap(), json!(1));
    assert_eq!(tracker.pending_count().await, 0);
}

/// **VALUE**: Verifies a send failure rejects at once and leaves no pending entry.
///
/// **BUG THIS CATCHES**: Would catch a failed send leaving a timer armed that later
/// fires into a caller who already got an error.
#[tokio::test(start_paused = true)]
async fn given_no_host_when_call_issued_then_rejects_with_delivery_error() {
    let tracker = CallTracker::new();
    let transport = Transport::new(RetryPolicy {
        interval: Duration::from_millis(10),
        max_attempts: 2,
    });

    let result = tracker
        .issue(&transport, "getVersion", json!({}), LONG, None)
        .await;

    assert!(matches!(result, Err(IpcError::Delivery { .. })));
    assert_eq!(tracker.pending_count().await, 0);
}

/// **VALUE**: Verifies rejecting all pending calls settles each with `Closed`.
///
/// **BUG THIS CATCHES**: Would catch callers hanging after the host goes away.
#[tokio::test]
async fn given_pending_calls_when_rejected_all_then_each_gets_closed() {
    let tracker = CallTracker::new();
    let (transport, mut posted) = attached_transport().await;

    let first = spawn_call(&tracker, &transport, "a", LONG);
    next_posted(&mut posted).await;
    let second = spawn_call(&tracker, &transport, "b", LONG);
    next_posted(&mut posted).await;

    let rejected = tracker.reject_all("host went away").await;

    assert_eq!(rejected, 2);
    assert!(matches!(first.await.unwrap(), Err(IpcError::Closed { .. })));
    assert!(matches!(second.await.unwrap(), Err(IpcError::Closed { .. })));
    assert_eq!(tracker.pending_count().await, 0);
}

/// **VALUE**: Verifies the event callback is reachable while the call is pending.
///
/// **BUG THIS CATCHES**: Would catch callbacks being dropped on registration or
/// surviving settlement.
#[tokio::test]
async fn given_event_stream_call_when_pending_then_callback_is_available() {
    let tracker = CallTracker::new();
    let (transport, mut posted) = attached_transport().await;
    let seen = Arc::new(AtomicUsize::new(0));

    let call = {
        let tracker = tracker.clone();
        let transport = transport.clone();
        let seen = Arc::clone(&seen);
        tokio::spawn(async move {
            tracker
                .issue_with_events(
                    &transport,
                    "startPrint",
                    json!({}),
                    LONG,
                    Arc::new(move |_event: &str, _data: &Value| -> Result<(), HandlerError> {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .await
        })
    };
    let id = next_posted(&mut posted).await.id.expect("request id");

    let callback = tracker.event_callback(&id).await.expect("callback registered");
    callback("onPrintProgress", &json!({"progress": 50})).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    tracker.settle(&id, ResponseCode::SUCCESS, None, json!({"jobId": "j1"})).await;
    let outcome = call.await.unwrap().unwrap();

    assert_eq!(outcome.response, json!({"jobId": "j1"}));
    assert_eq!(outcome.cleanup.id(), id);
    assert!(tracker.event_callback(&id).await.is_none());

    // Cleanup after settlement is harmless, twice over.
    outcome.cleanup.invoke().await;
    outcome.cleanup.invoke().await;
    assert_eq!(tracker.pending_count().await, 0);
}
