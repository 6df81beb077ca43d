// Unit tests for StructuredMessage wire shape and validation

use crate::{MessageKind, ModelError, Reply, StructuredMessage};

use common::ResponseCode;

use serde_json::{Value, json};

/// **VALUE**: Verifies a host response parses into the expected fields.
///
/// **WHY THIS MATTERS**: This is the exact shape the native host sends back for every
/// call. If any field is lost, pending calls never resolve.
///
/// **BUG THIS CATCHES**: Would catch a missing `rename = "type"` or a wrong code type.
#[test]
fn given_host_response_json_when_parsed_then_fields_are_populated() {
    // GIVEN: A response as sent by the host
    let raw = r#"{"id":"req-1001","method":"getVersion","type":"response",
                  "code":0,"message":"success","data":{"version":"1.0.0"}}"#;

    // WHEN: Parsing
    let message: StructuredMessage = serde_json::from_str(raw).unwrap();

    // THEN: All response fields are present
    assert_eq!(message.id.as_deref(), Some("req-1001"));
    assert_eq!(message.method, "getVersion");
    assert_eq!(message.kind, MessageKind::Response);
    assert_eq!(message.code, Some(ResponseCode::SUCCESS));
    assert_eq!(message.message.as_deref(), Some("success"));
    assert_eq!(message.data_or_null(), json!({"version": "1.0.0"}));
}

/// **VALUE**: Verifies unknown `type` values survive parsing.
///
/// **WHY THIS MATTERS**: The router must log and discard unknown types, not fail to
/// parse the whole message.
///
/// **BUG THIS CATCHES**: Would catch removal of the untagged fallback variant.
#[test]
fn given_unknown_type_when_parsed_then_kind_is_other() {
    let raw = r#"{"id":null,"method":"x","type":"broadcast"}"#;

    let message: StructuredMessage = serde_json::from_str(raw).unwrap();

    assert_eq!(message.kind, MessageKind::Other(String::from("broadcast")));
    assert_eq!(message.kind.to_string(), "broadcast");
}

/// **VALUE**: Verifies a message without `type` is treated as a request.
///
/// **WHY THIS MATTERS**: Native hosts send plain calls without a type field.
///
/// **BUG THIS CATCHES**: Would catch changing the default kind.
#[test]
fn given_missing_type_when_parsed_then_kind_defaults_to_request() {
    let raw = r#"{"id":"h-1","method":"getStatus","params":{}}"#;

    let message: StructuredMessage = serde_json::from_str(raw).unwrap();

    assert_eq!(message.kind, MessageKind::Request);
    assert!(message.validate().is_ok());
}

/// **VALUE**: Verifies a not-found response keeps an explicit `data: null`.
///
/// **WHY THIS MATTERS**: Callers check `data === null` on 404 responses.
///
/// **BUG THIS CATCHES**: Would catch `skip_serializing_if` dropping null payloads.
#[test]
fn given_not_found_reply_when_serialized_then_data_is_explicit_null() {
    // GIVEN: A 404 response
    let message = StructuredMessage::response("req-7", "nope", Reply::not_found("Method not found"));

    // WHEN: Serialising
    let value: Value = serde_json::to_value(&message).unwrap();

    // THEN: Wire shape matches the protocol
    assert_eq!(
        value,
        json!({
            "id": "req-7",
            "method": "nope",
            "type": "response",
            "code": 404,
            "message": "Method not found",
            "data": null
        })
    );
}

/// **VALUE**: Verifies unscoped events serialise `id: null`.
///
/// **BUG THIS CATCHES**: Would catch events being mis-correlated by a stale id.
#[test]
fn given_unscoped_event_when_serialized_then_id_is_null_and_no_params() {
    let message = StructuredMessage::event("onNotification", json!({"level": "info"}), None);

    let value: Value = serde_json::to_value(&message).unwrap();

    assert_eq!(value["id"], Value::Null);
    assert_eq!(value["type"], "event");
    assert!(value.get("params").is_none());
    assert!(value.get("code").is_none());
}

/// **VALUE**: Verifies structural validation per message type.
///
/// **WHY THIS MATTERS**: Requests without an id cannot be answered and responses
/// without an id cannot be matched; both must be dropped before dispatch.
///
/// **BUG THIS CATCHES**: Would catch validation accepting unanswerable messages.
#[test]
fn given_malformed_messages_when_validated_then_returns_validation_error() {
    let cases = [
        (r#"{"method":"a","type":"request"}"#, "Request message missing id field"),
        (r#"{"id":"1","type":"request"}"#, "Request message missing method field"),
        (r#"{"method":"a","type":"response","code":0}"#, "Response message missing id field"),
        (r#"{"id":"1","type":"event"}"#, "Event message missing method field"),
    ];

    for (raw, expected) in cases {
        let message: StructuredMessage = serde_json::from_str(raw).unwrap();
        match message.validate() {
            Err(ModelError::Validation { message, .. }) => assert_eq!(message, expected),
            Ok(()) => panic!("Expected validation error for {raw}"),
        }
    }
}

/// **VALUE**: Verifies an event without id is valid.
///
/// **BUG THIS CATCHES**: Would catch over-strict validation dropping global events.
#[test]
fn given_event_without_id_when_validated_then_passes() {
    let message = StructuredMessage::event("onStatus", Value::Null, None);
    assert!(message.validate().is_ok());
}

/// **VALUE**: Verifies absent params default to an empty object.
///
/// **WHY THIS MATTERS**: Handlers index into params; `null` would force every handler
/// to special-case missing params.
#[test]
fn given_request_without_params_when_params_read_then_empty_object() {
    let raw = r#"{"id":"1","method":"a","type":"request"}"#;
    let message: StructuredMessage = serde_json::from_str(raw).unwrap();

    assert_eq!(message.params_or_default(), json!({}));
}
