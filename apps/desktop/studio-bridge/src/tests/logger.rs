// Unit tests for logger module initialization logic
// Tests focus on idempotency and error handling

use crate::logger::{LOG_FILE_NAME, build_dispatch, initialize, installed_log_file};

use std::path::PathBuf;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: Startup code and tests may both reach initialization. If the
/// second call errors, the bridge would refuse to start for a harmless reason.
///
/// **BUG THIS CATCHES**: Would catch the install guard being dropped, causing fern
/// to fail when setting a global logger twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN: Calling initialize twice
    let result1 = initialize(temp_dir.path());
    let result2 = initialize(temp_dir.path());

    // THEN: Both should return Ok (second one logs warning but doesn't error)
    assert!(result1.is_ok(), "First initialization should succeed");
    assert!(
        result2.is_ok(),
        "Second initialization should succeed (idempotent)"
    );

    // AND: The first directory stays the one being written to
    assert_eq!(
        installed_log_file(),
        Some(temp_dir.path().join(LOG_FILE_NAME))
    );
}

/// **VALUE**: Verifies that an unusable log directory is reported, not panicked on.
///
/// **WHY THIS MATTERS**: If the data directory is read-only or missing, startup should
/// fail with a clear error the launching host can display.
///
/// **BUG THIS CATCHES**: Would catch if `fern::log_file()` is unwrapped instead of
/// mapped into `AppError`.
#[test]
fn given_invalid_log_dir_when_building_dispatch_then_returns_startup_error() {
    // GIVEN: A path that cannot hold a file on Unix-like systems
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Building the dispatch
    let result = build_dispatch(&invalid_dir);

    // THEN: Should return the Startup variant naming the file
    let err = match result {
        Ok(_) => panic!("Should return error for invalid log directory"),
        Err(err) => err,
    };
    let err_string = format!("{err:?}");
    assert!(err_string.contains("Startup"), "got: {err_string}");
    assert!(err_string.contains(LOG_FILE_NAME), "got: {err_string}");
}

#[test]
fn given_writable_dir_when_building_dispatch_then_log_file_is_created() {
    // GIVEN: An empty directory
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN: Building (not applying) the dispatch
    let result = build_dispatch(temp_dir.path());

    // THEN: The log file exists
    assert!(result.is_ok());
    assert!(temp_dir.path().join(LOG_FILE_NAME).exists());
}
