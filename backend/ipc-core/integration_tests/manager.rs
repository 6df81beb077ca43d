use crate::helpers::{
    attached_manager, host_event, host_request, host_response, next_posted,
};

use ipc_core::error::{HandlerError, IpcError};
use ipc_core::ipc::{EventCallback, EventHandler, IpcManager, RequestHandler, RetryPolicy};

use common::ResponseCode;
use models::MessageKind;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

// ============================================================================
// Outbound calls
// ============================================================================

/// **VALUE**: Verifies the basic request/response round trip through the manager.
///
/// **WHY THIS MATTERS**: This is the path every UI call to the host takes.
///
/// **BUG THIS CATCHES**: Would catch broken id correlation between the request the
/// manager posts and the response the host sends back.
#[tokio::test]
async fn given_host_answers_when_request_sent_then_resolves_with_response_data() {
    // GIVEN: A manager attached to a host
    let (manager, _host, mut posted) = attached_manager().await;

    // WHEN: The UI calls getVersion and the host answers
    let call = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .request("getVersion", json!({}), Some(Duration::from_millis(10_000)))
                .await
        })
    };
    let request = next_posted(&mut posted).await;
    assert_eq!(request.id.as_deref(), Some("req-1001"));
    assert_eq!(request.kind, MessageKind::Request);
    assert_eq!(request.method, "getVersion");

    manager
        .receive_raw(&host_response(
            "req-1001",
            "getVersion",
            0,
            "success",
            json!({"version": "1.0.0"}),
        ))
        .await;

    // THEN: The call resolves with the response data
    let result = call.await.unwrap().unwrap();
    assert_eq!(result, json!({"version": "1.0.0"}));
    assert_eq!(manager.pending_calls().await, 0);
}

/// **VALUE**: Verifies an unanswered call times out with the method name.
///
/// **BUG THIS CATCHES**: Would catch the timeout error losing the method name or
/// the pending entry leaking.
#[tokio::test(start_paused = true)]
async fn given_silent_host_when_request_times_out_then_error_names_method() {
    let (manager, _host, _posted) = attached_manager().await;

    let result = manager
        .request("slowOp", json!({}), Some(Duration::from_millis(50)))
        .await;

    let error = result.expect_err("slowOp should time out");
    assert!(matches!(error, IpcError::Timeout { ref method, .. } if method == "slowOp"));
    assert!(error.to_string().contains("slowOp"));
    assert_eq!(manager.pending_calls().await, 0);
}

/// **VALUE**: Verifies a nonzero response code rejects the call with the host's details.
#[tokio::test]
async fn given_host_error_when_request_sent_then_rejects_with_code_and_message() {
    let (manager, _host, mut posted) = attached_manager().await;

    let call = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request("deleteFile", json!({"path": "/x"}), None).await })
    };
    let id = next_posted(&mut posted).await.id.expect("request id");
    manager
        .receive_raw(&host_response(&id, "deleteFile", 403, "Forbidden", Value::Null))
        .await;

    let error = call.await.unwrap().expect_err("call should fail");
    assert!(matches!(error, IpcError::Remote { code: ResponseCode::FORBIDDEN, .. }));
    match error {
        IpcError::Remote { message, .. } => assert_eq!(message, "Forbidden"),
        other => panic!("Expected remote error, got {other:?}"),
    }
}

/// **VALUE**: Verifies concurrent calls get distinct ids and each gets its own answer.
///
/// **WHY THIS MATTERS**: The UI fires many calls at once; crossed wires would hand
/// one component another's data.
///
/// **BUG THIS CATCHES**: Would catch id reuse or a non-atomic counter.
#[tokio::test]
async fn given_many_concurrent_calls_when_answered_out_of_order_then_each_gets_its_own_data() {
    let (manager, _host, mut posted) = attached_manager().await;
    let count = 20;

    let mut calls = Vec::new();
    for n in 0..count {
        let manager = manager.clone();
        calls.push(tokio::spawn(async move {
            manager.request("getItem", json!({"n": n}), None).await
        }));
    }

    let mut requests = Vec::new();
    for _ in 0..count {
        requests.push(next_posted(&mut posted).await);
    }
    let ids: HashSet<String> = requests.iter().filter_map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), count);

    for request in requests.iter().rev() {
        let id = request.id.clone().expect("request id");
        let n = request.params.as_ref().expect("params")["n"].clone();
        manager
            .receive_raw(&host_response(&id, "getItem", 0, "success", json!({"n": n})))
            .await;
    }

    for (n, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap().unwrap(), json!({"n": n}));
    }
}

/// **VALUE**: Verifies a response with an unknown id has no observable effect.
#[tokio::test]
async fn given_pending_call_when_unrelated_response_arrives_then_call_stays_pending() {
    let (manager, _host, mut posted) = attached_manager().await;

    let _call = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request("a", json!({}), None).await })
    };
    next_posted(&mut posted).await;

    manager
        .receive_raw(&host_response("req-424242", "a", 0, "success", json!(1)))
        .await;

    assert_eq!(manager.pending_calls().await, 1);
}

/// **VALUE**: Verifies delivery gives up after five attempts one second apart.
///
/// **WHY THIS MATTERS**: A host that never becomes ready must surface as an error,
/// not a hang.
///
/// **BUG THIS CATCHES**: Would catch unbounded retry or a pending entry left behind
/// by a failed send.
#[tokio::test(start_paused = true)]
async fn given_unavailable_host_when_request_sent_then_delivery_fails_after_five_attempts() {
    let (manager, host, _posted) = attached_manager().await;
    host.set_available(false);

    let result = manager.request("getVersion", json!({}), None).await;

    assert!(matches!(result, Err(IpcError::Delivery { .. })));
    assert_eq!(host.attempts(), 5);
    assert_eq!(manager.pending_calls().await, 0);
}

/// **VALUE**: Verifies a message is delivered once the host comes up mid-retry.
///
/// **BUG THIS CATCHES**: Would catch the transport caching the unavailable state.
#[tokio::test(start_paused = true)]
async fn given_host_comes_up_late_when_request_sent_then_delivered_on_retry() {
    let (manager, host, mut posted) = attached_manager().await;
    host.set_available(false);

    let call = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request("ping", json!({}), None).await })
    };
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    host.set_available(true);

    let request = next_posted(&mut posted).await;
    assert_eq!(host.attempts(), 3);

    let id = request.id.expect("request id");
    manager
        .receive_raw(&host_response(&id, "ping", 0, "success", json!("pong")))
        .await;
    assert_eq!(call.await.unwrap().unwrap(), json!("pong"));
}

/// **VALUE**: Verifies detaching rejects outstanding calls with `Closed`.
///
/// **BUG THIS CATCHES**: Would catch callers waiting out their full timeout after
/// the host is gone.
#[tokio::test]
async fn given_pending_call_when_detached_then_call_rejected_as_closed() {
    let (manager, _host, mut posted) = attached_manager().await;

    let call = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request("longJob", json!({}), None).await })
    };
    next_posted(&mut posted).await;

    let rejected = manager.detach().await;

    assert_eq!(rejected, 1);
    assert!(!manager.is_attached().await);
    assert!(matches!(call.await.unwrap(), Err(IpcError::Closed { .. })));
}

/// **VALUE**: Verifies two managers do not share state.
///
/// **BUG THIS CATCHES**: Would catch hidden globals in the counter or tables.
#[tokio::test]
async fn given_two_managers_when_both_issue_calls_then_ids_are_independent() {
    let (first, _first_host, mut first_posted) = attached_manager().await;
    let (second, _second_host, mut second_posted) = attached_manager().await;

    let _a = {
        let first = first.clone();
        tokio::spawn(async move { first.request("a", json!({}), None).await })
    };
    let _b = {
        let second = second.clone();
        tokio::spawn(async move { second.request("b", json!({}), None).await })
    };

    assert_eq!(next_posted(&mut first_posted).await.id.as_deref(), Some("req-1001"));
    assert_eq!(next_posted(&mut second_posted).await.id.as_deref(), Some("req-1001"));
    assert_eq!(second.pending_calls().await, 1);
    assert_eq!(first.pending_calls().await, 1);
}

// ============================================================================
// Events
// ============================================================================

fn recording_handler(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> EventHandler {
    let log = Arc::clone(log);
    Arc::new(move |data: &Value| -> Result<(), HandlerError> {
        log.lock().unwrap().push(format!("{name}:{data}"));
        Ok(())
    })
}

/// **VALUE**: Verifies host events reach every subscriber in subscription order.
#[tokio::test]
async fn given_two_subscribers_when_host_sends_event_then_both_called_in_order() {
    let (manager, _host, _posted) = attached_manager().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    manager.on("onNotification", recording_handler(&log, "first"));
    manager.on("onNotification", recording_handler(&log, "second"));

    manager
        .receive_raw(&host_event(None, "onNotification", json!({"level": "info"})))
        .await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            String::from(r#"first:{"level":"info"}"#),
            String::from(r#"second:{"level":"info"}"#)
        ]
    );
}

/// **VALUE**: Verifies an unsubscribed handler no longer receives events.
#[tokio::test]
async fn given_unsubscribed_handler_when_event_arrives_then_not_called() {
    let (manager, _host, _posted) = attached_manager().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler = recording_handler(&log, "gone");
    manager.on("onStatus", Arc::clone(&handler));

    assert!(manager.off("onStatus", &handler));
    manager
        .receive_raw(&host_event(None, "onStatus", json!(1)))
        .await;

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(manager.subscriber_count("onStatus"), 0);
}

/// **VALUE**: Verifies a call with an event stream sees its scoped events and resolves
/// with the response and a cleanup handle.
///
/// **WHY THIS MATTERS**: Long-running host jobs (printing, uploads) report progress
/// this way; progress for one job must reach that job's caller.
///
/// **BUG THIS CATCHES**: Would catch scoped events skipping the callback, skipping
/// the bus, or still reaching the callback after the call settled.
#[tokio::test]
async fn given_event_stream_call_when_host_sends_progress_then_callback_and_bus_see_it() {
    // GIVEN: A bus subscriber and a call with a progress callback
    let (manager, _host, mut posted) = attached_manager().await;
    let bus_log = Arc::new(Mutex::new(Vec::new()));
    manager.on("onPrintProgress", recording_handler(&bus_log, "bus"));

    let seen: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let callback: EventCallback = {
        let seen = Arc::clone(&seen);
        Arc::new(move |event: &str, data: &Value| -> Result<(), HandlerError> {
            seen.lock().unwrap().push((event.to_string(), data.clone()));
            Ok(())
        })
    };

    let call = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .request_with_events("startPrint", json!({"file": "model.gcode"}), callback, None)
                .await
        })
    };
    let id = next_posted(&mut posted).await.id.expect("request id");

    // WHEN: The host reports progress, then answers
    manager
        .receive_raw(&host_event(Some(&id), "onPrintProgress", json!({"progress": 50})))
        .await;
    manager
        .receive_raw(&host_response(&id, "startPrint", 0, "success", json!({"jobId": "j1"})))
        .await;
    let outcome = call.await.unwrap().unwrap();

    // THEN: Callback saw the event once, the bus saw it too, response is returned
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(String::from("onPrintProgress"), json!({"progress": 50}))]
    );
    assert_eq!(outcome.response, json!({"jobId": "j1"}));
    assert_eq!(bus_log.lock().unwrap().len(), 1);

    // THEN: After settlement and cleanup, scoped events reach only the bus
    outcome.cleanup.invoke().await;
    manager
        .receive_raw(&host_event(Some(&id), "onPrintProgress", json!({"progress": 100})))
        .await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(bus_log.lock().unwrap().len(), 2);
}

/// **VALUE**: Verifies UI-originated events are posted with the right shape.
#[tokio::test]
async fn given_attached_manager_when_event_sent_then_host_receives_event_message() {
    let (manager, _host, mut posted) = attached_manager().await;

    manager
        .send_event("onThemeChanged", json!({"theme": "dark"}), None)
        .await
        .unwrap();
    manager
        .send_event("onUploadChunk", json!({"chunk": 3}), Some(String::from("h-7")))
        .await
        .unwrap();

    let global = next_posted(&mut posted).await;
    let scoped = next_posted(&mut posted).await;
    assert_eq!(global.kind, MessageKind::Event);
    assert_eq!(global.id, None);
    assert_eq!(global.data, Some(json!({"theme": "dark"})));
    assert_eq!(scoped.id.as_deref(), Some("h-7"));
}

// ============================================================================
// Inbound requests
// ============================================================================

/// **VALUE**: Verifies host requests to unknown methods get a 404 response.
#[tokio::test]
async fn given_no_handler_when_host_requests_then_responds_404() {
    let (manager, _host, mut posted) = attached_manager().await;

    manager
        .receive_raw(&host_request("h-1", "noSuchMethod", json!({})))
        .await;

    let response = next_posted(&mut posted).await;
    assert_eq!(response.kind, MessageKind::Response);
    assert_eq!(response.id.as_deref(), Some("h-1"));
    assert_eq!(response.code, Some(ResponseCode::NOT_FOUND));
    assert_eq!(response.data, Some(Value::Null));
}

/// **VALUE**: Verifies host requests reach registered handlers and handlers can be removed.
#[tokio::test]
async fn given_registered_handler_when_host_requests_then_handler_answers() {
    let (manager, _host, mut posted) = attached_manager().await;
    manager
        .on_request(
            "add",
            RequestHandler::sync(|params| {
                let a = params["a"].as_i64().unwrap_or_default();
                let b = params["b"].as_i64().unwrap_or_default();
                Ok(json!({"sum": a + b}))
            }),
        )
        .await;
    assert!(manager.has_handler("add").await);

    manager
        .receive_raw(&host_request("h-2", "add", json!({"a": 2, "b": 3})))
        .await;
    let response = next_posted(&mut posted).await;
    assert_eq!(response.code, Some(ResponseCode::SUCCESS));
    assert_eq!(response.data, Some(json!({"sum": 5})));

    assert!(manager.off_request("add").await);
    assert!(!manager.has_handler("add").await);
}

/// **VALUE**: Verifies a slow handler does not hold up later messages.
///
/// **WHY THIS MATTERS**: A host request that waits on the user must not freeze
/// responses to the UI's own calls.
///
/// **BUG THIS CATCHES**: Would catch the router awaiting handlers to completion before
/// routing the next message.
#[tokio::test]
async fn given_slow_handler_when_later_response_arrives_then_response_not_blocked() {
    let (manager, _host, mut posted) = attached_manager().await;
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let release_rx = Arc::new(tokio::sync::Mutex::new(Some(release_rx)));
    manager
        .on_request(
            "confirm",
            RequestHandler::with_responder(move |_params, responder| {
                let release_rx = Arc::clone(&release_rx);
                async move {
                    if let Some(rx) = release_rx.lock().await.take() {
                        let _ = rx.await;
                    }
                    responder.success(json!(true)).await?;
                    Ok::<(), HandlerError>(())
                }
            }),
        )
        .await;

    let call = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request("getVersion", json!({}), None).await })
    };
    let request = next_posted(&mut posted).await;

    manager
        .receive_raw(&host_request("h-3", "confirm", json!({})))
        .await;
    manager
        .receive_raw(&host_response(
            request.id.as_deref().expect("request id"),
            "getVersion",
            0,
            "success",
            json!("1.0.0"),
        ))
        .await;

    assert_eq!(call.await.unwrap().unwrap(), json!("1.0.0"));

    release_tx.send(()).unwrap();
    let response = next_posted(&mut posted).await;
    assert_eq!(response.id.as_deref(), Some("h-3"));
}

/// **VALUE**: Verifies host requests reach their handlers in delivery order.
///
/// **WHY THIS MATTERS**: Hosts send sequences like "select printer" then "start job".
/// If the second handler runs first, it acts on stale state.
///
/// **BUG THIS CATCHES**: Would catch handing each request to its own task before the
/// handler is invoked, which lets a multi-threaded runtime start them in any order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_many_requests_when_received_on_multi_thread_runtime_then_handled_in_order() {
    // GIVEN: A sync handler recording the sequence number of each request
    let (manager, _host, mut posted) = attached_manager().await;
    let handled = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&handled);
    manager
        .on_request(
            "append",
            RequestHandler::sync(move |params: Value| -> Result<Value, HandlerError> {
                let n = params["n"].as_u64().unwrap_or_default();
                recorder.lock().unwrap().push(n);
                Ok(json!(n))
            }),
        )
        .await;

    // WHEN: 500 requests arrive one after another
    const COUNT: u64 = 500;
    for n in 0..COUNT {
        manager
            .receive_raw(&host_request(&format!("h-{n}"), "append", json!({ "n": n })))
            .await;
    }
    for _ in 0..COUNT {
        next_posted(&mut posted).await;
    }

    // THEN: They were handled in exactly that order
    let handled = handled.lock().unwrap().clone();
    assert_eq!(handled, (0..COUNT).collect::<Vec<_>>());
}

/// **VALUE**: Verifies async handlers also start in delivery order, even when each
/// one suspends before replying.
///
/// **BUG THIS CATCHES**: Would catch deferring the first poll of an async handler to
/// a spawned task.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_suspending_async_handlers_when_requests_received_then_started_in_order() {
    // GIVEN: A handler that records its sequence number, then yields before replying
    let (manager, _host, mut posted) = attached_manager().await;
    let started = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&started);
    manager
        .on_request(
            "step",
            RequestHandler::with_responder(move |params, responder| {
                let recorder = Arc::clone(&recorder);
                async move {
                    let n = params["n"].as_u64().unwrap_or_default();
                    recorder.lock().unwrap().push(n);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    responder.success(json!(n)).await?;
                    Ok::<(), HandlerError>(())
                }
            }),
        )
        .await;

    // WHEN
    const COUNT: u64 = 200;
    for n in 0..COUNT {
        manager
            .receive_raw(&host_request(&format!("s-{n}"), "step", json!({ "n": n })))
            .await;
    }
    for _ in 0..COUNT {
        next_posted(&mut posted).await;
    }

    // THEN: Every handler started in arrival order, and all of them replied
    let started = started.lock().unwrap().clone();
    assert_eq!(started, (0..COUNT).collect::<Vec<_>>());
}

/// **VALUE**: Verifies messages without `type` are treated as requests.
#[tokio::test]
async fn given_message_without_type_when_received_then_dispatched_as_request() {
    let (manager, _host, mut posted) = attached_manager().await;
    manager
        .on_request("getStatus", RequestHandler::sync(|_params| Ok(json!("idle"))))
        .await;

    manager
        .receive_raw(r#"{"id":"h-4","method":"getStatus"}"#)
        .await;

    let response = next_posted(&mut posted).await;
    assert_eq!(response.id.as_deref(), Some("h-4"));
    assert_eq!(response.data, Some(json!("idle")));
}

/// **VALUE**: Verifies malformed and unknown messages are dropped without effect.
///
/// **WHY THIS MATTERS**: A buggy host must not be able to crash or confuse the layer.
///
/// **BUG THIS CATCHES**: Would catch parse errors propagating, id-less requests
/// being answered, or unknown types being dispatched.
#[tokio::test]
async fn given_malformed_messages_when_received_then_dropped() {
    let (manager, _host, mut posted) = attached_manager().await;
    let hits = Arc::new(AtomicUsize::new(0));
    manager
        .on_request("count", {
            let hits = Arc::clone(&hits);
            RequestHandler::sync(move |_params| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })
        })
        .await;

    manager.receive_raw("not json at all").await;
    manager
        .receive_raw(r#"{"method":"count","type":"request"}"#)
        .await;
    manager
        .receive_raw(r#"{"id":"h-5","method":"count","type":"broadcast"}"#)
        .await;
    manager
        .receive_raw(r#"{"method":"count","type":"response","code":0}"#)
        .await;
    tokio::task::yield_now().await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(posted.try_recv().is_err());
}

/// **VALUE**: Verifies the configured default timeout is used when none is passed.
#[tokio::test(start_paused = true)]
async fn given_manager_with_short_default_when_request_without_timeout_then_uses_default() {
    let manager = IpcManager::with_settings(RetryPolicy::default(), Duration::from_millis(200));
    let (host, _posted) = crate::helpers::MockHost::new();
    manager.attach(host).await;
    let started = tokio::time::Instant::now();

    let result = manager.request("slowOp", json!({}), None).await;

    assert!(matches!(result, Err(IpcError::Timeout { .. })));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(10));
}
