// Unit tests for error module
// Fatal errors are written to stderr as JSON, so serialisation must keep working

use crate::error::AppError;
use crate::load_config;

use common::ErrorLocation;

use ipc_core::error::{BridgeError, ConfigError};

use std::panic::Location;

/// **VALUE**: Tests that errors can be serialized for the launching host.
///
/// **WHY THIS MATTERS**: On a fatal exit the bridge prints the error as JSON on stderr.
/// A host that launched it parses that line to explain why the webview cannot connect.
///
/// **BUG THIS CATCHES**: Would catch if someone removes the `#[derive(Serialize)]`
/// or adds a field that cannot be serialized.
#[test]
fn given_app_error_when_serialized_then_contains_variant_and_message() {
    // GIVEN: An AppError
    let err = AppError::Startup {
        message: String::from("Test"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let result = serde_json::to_string(&err);

    // THEN: Should succeed and carry the tag and the message
    assert!(result.is_ok(), "Error should be serializable");
    let json = result.unwrap();
    assert!(json.contains("\"type\":\"Startup\""), "JSON should contain variant tag");
    assert!(json.contains("Test"), "JSON should contain message");
}

/// **VALUE**: Verifies config failures keep their cause when lifted into `AppError`.
///
/// **BUG THIS CATCHES**: Would catch a `From` impl that drops the validation reason,
/// leaving the operator with "Config Error" and nothing to fix.
#[test]
fn given_config_error_when_converted_then_message_keeps_reason() {
    // GIVEN: A validation failure from ipc-core
    let source = ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        field: "bridge.port",
        reason: String::from("must not be privileged"),
    };

    // WHEN: Converting
    let err = AppError::from(source);

    // THEN: The Config variant carries the original reason
    match err {
        AppError::Config { message, .. } => {
            assert!(message.contains("must not be privileged"), "got: {message}");
        }
        other => panic!("Expected Config variant, got {other:?}"),
    }
}

#[test]
fn given_bridge_error_when_converted_then_maps_to_bridge_variant() {
    // GIVEN: A bridge failure
    let source = BridgeError::unavailable("port in use");

    // WHEN: Converting
    let err: AppError = source.into();

    // THEN: The Bridge variant is used
    assert!(matches!(err, AppError::Bridge { .. }));
    assert!(err.to_string().starts_with("Bridge Error:"));
}

/// **VALUE**: Verifies a corrupt `ipc.json` stops startup with a Config error.
///
/// **WHY THIS MATTERS**: Silently falling back to defaults would bind the default
/// port while the launcher expects the configured one.
///
/// **BUG THIS CATCHES**: Would catch `load_config` swallowing parse failures or
/// mapping them to the wrong variant.
#[test]
fn given_corrupt_config_file_when_loaded_then_returns_config_error() {
    // GIVEN: An ipc.json that is not JSON
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join("ipc.json"), "{ not json").unwrap();

    // WHEN
    let result = load_config(temp_dir.path());

    // THEN
    match result {
        Err(AppError::Config { message, .. }) => {
            assert!(message.contains("ipc.json"), "got: {message}");
        }
        Err(other) => panic!("Expected Config variant, got {other:?}"),
        Ok(_) => panic!("Corrupt config should not load"),
    }
}

#[test]
fn given_no_config_file_when_loaded_then_defaults_are_used() {
    // GIVEN: An empty config directory
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN
    let config = load_config(temp_dir.path()).unwrap();

    // THEN
    assert_eq!(config.bridge.port, ipc_core::BRIDGE_DEFAULT_PORT);
}
