//! Test assertions for stage outputs and tool responses.

use crate::core::{StageOutput, StageStatus};
use crate::errors::ErrorKind;
use serde_json::Value;

/// Asserts that the output indicates success.
pub fn assert_output_succeeded(output: &StageOutput) {
    assert!(
        output.is_success(),
        "Expected success, got status: {:?} ({:?})",
        output.status,
        output.error
    );
}

/// Asserts that the output indicates failure.
pub fn assert_output_failed(output: &StageOutput) {
    assert!(
        output.is_failure(),
        "Expected failure, got status: {:?}",
        output.status
    );
}

/// Asserts that the output has the expected status.
pub fn assert_output_status(output: &StageOutput, expected: StageStatus) {
    assert_eq!(
        output.status, expected,
        "Expected status {:?}, got {:?}",
        expected, output.status
    );
}

/// Asserts that the output failed with the given error kind.
pub fn assert_output_kind(output: &StageOutput, expected: ErrorKind) {
    assert_eq!(
        output.error_kind,
        Some(expected),
        "Expected error kind {expected}, got {:?} ({:?})",
        output.error_kind,
        output.error
    );
}

/// Asserts that a tool response succeeded.
pub fn assert_tool_succeeded(response: &Value) {
    assert_eq!(
        response.get("success"),
        Some(&Value::Bool(true)),
        "Expected tool success, got {response}"
    );
}

/// Asserts that a tool response failed with the given error kind.
pub fn assert_tool_failed(response: &Value, expected: ErrorKind) {
    assert_eq!(
        response.get("success"),
        Some(&Value::Bool(false)),
        "Expected tool failure, got {response}"
    );
    assert_eq!(
        response.get("error_kind").and_then(Value::as_str),
        Some(expected.as_str()),
        "Expected error kind {expected}, got {response}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ArtifactError;
    use serde_json::json;

    #[test]
    fn test_output_assertions() {
        assert_output_succeeded(&StageOutput::ok_text("x"));
        let failed = StageOutput::from_error(&ArtifactError::EmptySessionKey);
        assert_output_failed(&failed);
        assert_output_kind(&failed, ErrorKind::EmptySessionKey);
        assert_output_status(&StageOutput::timed_out(1.0), StageStatus::TimedOut);
    }

    #[test]
    fn test_tool_assertions() {
        assert_tool_succeeded(&json!({"success": true}));
        assert_tool_failed(
            &json!({"success": false, "error_kind": "IOFailure"}),
            ErrorKind::IoFailure,
        );
    }

    #[test]
    #[should_panic(expected = "Expected tool success")]
    fn test_tool_assertion_panics() {
        assert_tool_succeeded(&json!({"success": false}));
    }
}
