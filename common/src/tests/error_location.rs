// Unit tests for ErrorLocation capture and formatting

use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures file, line, and column.
///
/// **WHY THIS MATTERS**: Every located error in the IPC layer renders its location.
/// If capture breaks, timeout and delivery errors stop pointing at the call site.
///
/// **BUG THIS CATCHES**: Would catch if file path extraction or line capture regresses.
#[test]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN/WHEN: An ErrorLocation captured here
    let location = ErrorLocation::from(Location::caller());

    // THEN: Should carry this file and a real position
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path"
    );
    assert!(location.line > 0, "Should capture line number");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies the bracketed `[file:line:column]` display format.
///
/// **WHY THIS MATTERS**: Log lines and error messages embed this format verbatim.
///
/// **BUG THIS CATCHES**: Would catch if Display drops brackets or a component.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting as string
    let formatted = location.to_string();

    // THEN: Should produce "[file:line:column]"
    assert!(formatted.starts_with('['), "Should start with '['");
    assert!(formatted.ends_with(']'), "Should end with ']'");
    assert!(
        formatted.contains(&format!(":{}:{}]", location.line, location.column)),
        "Should end with line and column"
    );
}
