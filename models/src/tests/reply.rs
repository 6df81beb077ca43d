// Unit tests for the Reply sum type

use crate::Reply;

use common::ResponseCode;

use serde_json::{Value, json};

/// **VALUE**: Verifies each convenience constructor maps to its status code.
///
/// **WHY THIS MATTERS**: Web UI code branches on these codes (404 vs 401 vs 400).
///
/// **BUG THIS CATCHES**: Would catch a constructor wired to the wrong code.
#[test]
fn given_convenience_constructors_when_built_then_codes_match_contract() {
    assert_eq!(Reply::success(Value::Null).code(), ResponseCode(0));
    assert_eq!(Reply::failure("x").code(), ResponseCode(1));
    assert_eq!(Reply::not_found("x").code(), ResponseCode(404));
    assert_eq!(Reply::bad_request("x", None).code(), ResponseCode(400));
    assert_eq!(Reply::unauthorized("x").code(), ResponseCode(401));
    assert_eq!(Reply::forbidden("x").code(), ResponseCode(403));
    assert_eq!(Reply::server_error("x", None).code(), ResponseCode(500));
    assert_eq!(Reply::error("x", 42, Value::Null).code(), ResponseCode(42));
}

/// **VALUE**: Verifies bad_request wraps validation errors under `validationErrors`.
///
/// **BUG THIS CATCHES**: Would catch the payload key being renamed or flattened.
#[test]
fn given_validation_errors_when_bad_request_built_then_payload_is_wrapped() {
    let reply = Reply::bad_request("Email is required", Some(json!(["email is required"])));

    assert_eq!(reply.data(), &json!({"validationErrors": ["email is required"]}));
    assert_eq!(reply.message(), "Email is required");
}

/// **VALUE**: Verifies server_error stringifies the underlying error.
///
/// **BUG THIS CATCHES**: Would catch a Debug rendering leaking into the payload.
#[test]
fn given_error_when_server_error_built_then_payload_holds_display_string() {
    let cause = std::io::Error::other("disk full");

    let reply = Reply::server_error("Upload failed", Some(&cause));

    assert_eq!(reply.data(), &json!({"error": "disk full"}));
}

/// **VALUE**: Verifies `custom` picks the variant from the code.
///
/// **WHY THIS MATTERS**: `custom(0, ..)` must be a success on the caller side.
///
/// **BUG THIS CATCHES**: Would catch custom always producing an error.
#[test]
fn given_custom_codes_when_built_then_variant_follows_code() {
    assert!(Reply::custom(0, "ok", json!(1)).is_success());

    let reply = Reply::custom(7, "partial", json!({"done": 3}));
    assert!(!reply.is_success());
    assert_eq!(reply.into_parts(), (ResponseCode(7), String::from("partial"), json!({"done": 3})));
}
