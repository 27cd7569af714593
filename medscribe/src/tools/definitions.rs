//! Tool definitions and result envelopes.

use crate::errors::ArtifactError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Declaration of a tool the model may call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// The tool name.
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// JSON Schema for the arguments object.
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Creates a new tool definition with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Adds a required string argument to the schema.
    #[must_use]
    pub fn with_string_arg(self, name: &str, description: &str) -> Self {
        let mut definition = self.with_optional_string_arg(name, description);
        if let Some(schema) = definition.input_schema.as_object_mut() {
            let required = schema
                .entry("required")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(list) = required.as_array_mut() {
                list.push(Value::String(name.to_string()));
            }
        }
        definition
    }

    /// Adds a string argument the caller may omit.
    #[must_use]
    pub fn with_optional_string_arg(mut self, name: &str, description: &str) -> Self {
        if let Some(props) = self
            .input_schema
            .get_mut("properties")
            .and_then(Value::as_object_mut)
        {
            props.insert(
                name.to_string(),
                serde_json::json!({ "type": "string", "description": description }),
            );
        }
        self
    }

    /// Returns the names of the required arguments.
    #[must_use]
    pub fn required_args(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Structured result every tool returns.
///
/// On failure the payload is left at its default, so every payload field is
/// blank rather than partially filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult<P> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Stable failure kind, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Operation-specific fields.
    #[serde(flatten)]
    pub payload: P,
}

impl<P: Default> ToolResult<P> {
    /// Creates a successful result.
    #[must_use]
    pub fn ok(message: impl Into<String>, payload: P) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_kind: None,
            payload,
        }
    }

    /// Creates a failed result with a blank payload.
    #[must_use]
    pub fn fail(err: &ArtifactError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            error_kind: Some(err.kind().as_str().to_string()),
            payload: P::default(),
        }
    }

    /// Converts a `Result` into a tool result.
    #[must_use]
    pub fn from_result(result: Result<(String, P), ArtifactError>) -> Self {
        match result {
            Ok((message, payload)) => Self::ok(message, payload),
            Err(err) => Self::fail(&err),
        }
    }
}

impl<P: Serialize> ToolResult<P> {
    /// Serializes the result into the JSON object handed back to the model.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "message": format!("Failed to serialize tool result: {e}"),
            })
        })
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        match self.to_value() {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        }
    }
}

/// Payload of `get_audio_file`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPayload {
    /// Absolute path of the located audio.
    pub audio_file_path: String,
    /// The filename as given.
    pub filename: String,
}

/// Payload of `transcribe_audio_file`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptPayload {
    /// Where the transcript was stored.
    pub transcript_file_path: String,
}

/// Payload of `save_processing_file`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePayload {
    /// Where the artifact was stored.
    pub file_path: String,
}

/// Payload of `read_processing_file`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPayload {
    /// Where the artifact was read from.
    pub file_path: String,
    /// The artifact text.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_definition_string_args() {
        let def = ToolDefinition::new("read_processing_file", "Reads an artifact")
            .with_string_arg("file_category", "Category")
            .with_string_arg("audio_filename", "Session key");

        assert_eq!(def.required_args(), vec!["file_category", "audio_filename"]);
        assert_eq!(def.input_schema["properties"]["audio_filename"]["type"], "string");
    }

    #[test]
    fn test_optional_arg_is_not_required() {
        let def = ToolDefinition::new("save_processing_file", "Saves an artifact")
            .with_string_arg("file_category", "Category")
            .with_optional_string_arg("contents", "Text");

        assert_eq!(def.required_args(), vec!["file_category"]);
        assert_eq!(def.input_schema["properties"]["contents"]["type"], "string");
    }

    #[test]
    fn test_ok_result_flattens_payload() {
        let result = ToolResult::ok(
            "Audio file found: CAR0002.mp3",
            AudioPayload {
                audio_file_path: "/srv/upload/CAR0002.mp3".to_string(),
                filename: "CAR0002.mp3".to_string(),
            },
        );
        assert_eq!(
            result.to_value(),
            json!({
                "success": true,
                "message": "Audio file found: CAR0002.mp3",
                "audio_file_path": "/srv/upload/CAR0002.mp3",
                "filename": "CAR0002.mp3",
            })
        );
    }

    #[test]
    fn test_failed_result_blank_payload() {
        let result: ToolResult<ReadPayload> = ToolResult::fail(&ArtifactError::EmptySessionKey);
        let dict = result.to_dict();

        assert_eq!(dict["success"], json!(false));
        assert_eq!(dict["error_kind"], json!("EmptySessionKey"));
        assert_eq!(dict["file_path"], json!(""));
        assert_eq!(dict["content"], json!(""));
    }

    #[test]
    fn test_result_round_trips_through_json() {
        let value = ToolResult::ok("saved", SavePayload { file_path: "a/b.txt".into() }).to_value();
        let back: ToolResult<SavePayload> = serde_json::from_value(value).unwrap();
        assert!(back.success);
        assert_eq!(back.payload.file_path, "a/b.txt");
    }
}
