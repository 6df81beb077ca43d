use ipc_core::config::IpcConfig;
use ipc_core::error::ConfigError;
use ipc_core::{BRIDGE_DEFAULT_URL, ipc::RetryPolicy};

use std::time::Duration;

use tempfile::TempDir;

/// **VALUE**: Verifies defaults match the documented protocol constants.
///
/// **WHY THIS MATTERS**: Hosts are built against a 10 s call timeout and a 1 s x 5
/// delivery window; silent drift breaks their assumptions.
///
/// **BUG THIS CATCHES**: Would catch a changed default in any section.
#[test]
fn given_default_config_when_read_then_matches_protocol_defaults() {
    let config = IpcConfig::default();

    assert_eq!(config.default_timeout(), Duration::from_secs(10));
    assert_eq!(
        config.retry_policy(),
        RetryPolicy {
            interval: Duration::from_secs(1),
            max_attempts: 5
        }
    );
    assert_eq!(config.bridge.url(), BRIDGE_DEFAULT_URL);
    assert!(config.validate().is_ok());
}

/// **VALUE**: Verifies a missing config file yields defaults.
#[test]
fn given_empty_dir_when_loaded_then_returns_defaults() {
    let dir = TempDir::new().unwrap();

    let config = IpcConfig::load(dir.path()).unwrap();

    assert_eq!(config, IpcConfig::default());
}

/// **VALUE**: Verifies save then load preserves custom values and leaves no temp file.
///
/// **BUG THIS CATCHES**: Would catch the atomic rename being skipped or fields not
/// being persisted.
#[test]
fn given_custom_config_when_saved_and_loaded_then_values_preserved() {
    let dir = TempDir::new().unwrap();
    let mut config = IpcConfig::default();
    config.calls.default_timeout_ms = 2_500;
    config.transport.max_attempts = 3;
    config.bridge.port = 0;

    config.save(dir.path()).unwrap();
    let loaded = IpcConfig::load(dir.path()).unwrap();

    assert_eq!(loaded, config);
    assert!(dir.path().join("ipc.json").exists());
    assert!(!dir.path().join("ipc.json.tmp").exists());
}

/// **VALUE**: Verifies partial files fill missing fields with defaults.
///
/// **WHY THIS MATTERS**: Users hand-edit this file and usually set one value.
#[test]
fn given_partial_file_when_loaded_then_missing_fields_default() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("ipc.json"),
        r#"{ "bridge": { "port": 20000 } }"#,
    )
    .unwrap();

    let config = IpcConfig::load(dir.path()).unwrap();

    assert_eq!(config.bridge.port, 20000);
    assert_eq!(config.bridge.bind_host, "127.0.0.1");
    assert_eq!(config.calls.default_timeout_ms, 10_000);
}

/// **VALUE**: Verifies corrupt files are reported, not silently replaced.
#[test]
fn given_corrupt_file_when_loaded_then_returns_parse_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ipc.json"), "{ not json").unwrap();

    let result = IpcConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies invalid values are rejected with the offending field.
///
/// **WHY THIS MATTERS**: Binding the bridge to a public interface would expose the
/// host to the network.
///
/// **BUG THIS CATCHES**: Would catch any validation rule being dropped.
#[test]
fn given_invalid_values_when_validated_then_names_field() {
    assert_invalid("version", |c| c.version = 2);
    assert_invalid("calls.default_timeout_ms", |c| c.calls.default_timeout_ms = 0);
    assert_invalid("transport.retry_interval_ms", |c| c.transport.retry_interval_ms = 0);
    assert_invalid("transport.max_attempts", |c| c.transport.max_attempts = 0);
    assert_invalid("bridge.bind_host", |c| c.bridge.bind_host = String::from("0.0.0.0"));
}

fn assert_invalid(expected: &str, mutate: impl FnOnce(&mut IpcConfig)) {
    let mut config = IpcConfig::default();
    mutate(&mut config);
    match config.validate() {
        Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, expected),
        other => panic!("Expected validation error for {expected}, got {other:?}"),
    }
}

/// **VALUE**: Verifies loopback hosts other than 127.0.0.1 are accepted.
#[test]
fn given_loopback_aliases_when_validated_then_accepted() {
    for host in ["localhost", "::1", "127.0.0.2"] {
        let mut config = IpcConfig::default();
        config.bridge.bind_host = host.to_string();
        assert!(config.validate().is_ok(), "{host} should be accepted");
    }
}
