//! Stage output type with factory methods.

use super::{ArtifactRecord, StageStatus};
use crate::errors::{ArtifactError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The output of a stage execution.
///
/// `StageOutput` is immutable once created and provides factory methods
/// for creating outputs with different statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the stage execution.
    pub status: StageStatus,

    /// Final text produced by the stage (model reply, review, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// The artifact committed by the stage, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRecord>,

    /// Additional structured data.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Error message (for failed executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Error kind (for failed executions caused by a tagged error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl Default for StageOutput {
    fn default() -> Self {
        Self::ok_empty()
    }
}

impl StageOutput {
    fn with_status(status: StageStatus) -> Self {
        Self {
            status,
            text: None,
            artifact: None,
            data: HashMap::new(),
            error: None,
            error_kind: None,
        }
    }

    /// Creates a successful output with no data.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self::with_status(StageStatus::Ok)
    }

    /// Creates a successful output carrying final text.
    #[must_use]
    pub fn ok_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::ok_empty()
        }
    }

    /// Creates a failure output with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(StageStatus::Fail)
        }
    }

    /// Creates a failure output from a tagged artifact error.
    #[must_use]
    pub fn from_error(err: &ArtifactError) -> Self {
        Self {
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            ..Self::with_status(StageStatus::Fail)
        }
    }

    /// Creates a timed out output.
    #[must_use]
    pub fn timed_out(after_secs: f64) -> Self {
        Self {
            error: Some(format!("Stage did not finish within {after_secs:.1}s")),
            ..Self::with_status(StageStatus::TimedOut)
        }
    }

    /// Attaches the committed artifact.
    #[must_use]
    pub fn with_artifact(mut self, record: ArtifactRecord) -> Self {
        self.artifact = Some(record);
        self
    }

    /// Adds a single data entry.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns true if the output indicates success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the output indicates failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Gets a value from the data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Returns the error message or an empty string.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    /// Converts the output to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("status".to_string(), serde_json::json!(self.status.to_string()));

        if let Some(ref text) = self.text {
            map.insert("text".to_string(), serde_json::json!(text));
        }

        if let Some(ref record) = self.artifact {
            let record_map: serde_json::Map<String, serde_json::Value> =
                record.to_dict().into_iter().collect();
            map.insert("artifact".to_string(), serde_json::Value::Object(record_map));
        }

        if !self.data.is_empty() {
            let data_map: serde_json::Map<String, serde_json::Value> =
                self.data.clone().into_iter().collect();
            map.insert("data".to_string(), serde_json::Value::Object(data_map));
        }

        if let Some(ref error) = self.error {
            map.insert("error".to_string(), serde_json::json!(error));
        }

        if let Some(kind) = self.error_kind {
            map.insert("error_kind".to_string(), serde_json::json!(kind.as_str()));
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_text() {
        let output = StageOutput::ok_text("Template looks accurate.");
        assert_eq!(output.status, StageStatus::Ok);
        assert!(output.is_success());
        assert_eq!(output.text.as_deref(), Some("Template looks accurate."));
    }

    #[test]
    fn test_fail_output() {
        let output = StageOutput::fail("Something went wrong");
        assert_eq!(output.status, StageStatus::Fail);
        assert_eq!(output.error_message(), "Something went wrong");
        assert!(output.is_failure());
        assert!(output.error_kind.is_none());
    }

    #[test]
    fn test_from_error_keeps_kind() {
        let output = StageOutput::from_error(&ArtifactError::EmptySessionKey);
        assert!(output.is_failure());
        assert_eq!(output.error_kind, Some(ErrorKind::EmptySessionKey));
    }

    #[test]
    fn test_timed_out() {
        let output = StageOutput::timed_out(2.0);
        assert_eq!(output.status, StageStatus::TimedOut);
        assert!(output.error_message().contains("2.0s"));
    }

    #[test]
    fn test_to_dict() {
        let output = StageOutput::from_error(&ArtifactError::EmptySessionKey);
        let dict = output.to_dict();

        assert_eq!(dict.get("status"), Some(&serde_json::json!("fail")));
        assert_eq!(dict.get("error_kind"), Some(&serde_json::json!("EmptySessionKey")));
    }

    #[test]
    fn test_serialization() {
        let output = StageOutput::ok_text("x").add_data("turns", serde_json::json!(2));
        let json = serde_json::to_string(&output).unwrap();
        let deserialized: StageOutput = serde_json::from_str(&json).unwrap();

        assert_eq!(output.status, deserialized.status);
        assert_eq!(output.get("turns"), deserialized.get("turns"));
    }
}
