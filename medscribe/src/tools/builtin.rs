//! The four callable tools exposed to the model.

use super::definitions::{
    AudioPayload, ReadPayload, SavePayload, ToolDefinition, ToolResult, TranscriptPayload,
};
use super::{Tool, ToolLayer, ToolRegistry};
use crate::errors::ArtifactError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Locates an uploaded recording.
pub const GET_AUDIO_FILE: &str = "get_audio_file";
/// Transcribes a located recording.
pub const TRANSCRIBE_AUDIO_FILE: &str = "transcribe_audio_file";
/// Saves a generated artifact.
pub const SAVE_PROCESSING_FILE: &str = "save_processing_file";
/// Reads any artifact.
pub const READ_PROCESSING_FILE: &str = "read_processing_file";

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ArtifactError> {
    serde_json::from_value(arguments).map_err(|e| ArtifactError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn log_outcome(tool: &str, response: &Value) {
    let success = response.get("success").and_then(Value::as_bool).unwrap_or(false);
    info!(tool = %tool, success, "Tool finished");
}

#[derive(Deserialize)]
struct GetAudioArgs {
    filename: String,
}

#[derive(Deserialize)]
struct TranscribeArgs {
    audio_file_path: String,
}

#[derive(Deserialize)]
struct SaveArgs {
    file_category: String,
    #[serde(default)]
    contents: Option<String>,
    audio_filename: String,
}

#[derive(Deserialize)]
struct ReadArgs {
    file_category: String,
    audio_filename: String,
}

/// `get_audio_file(filename)`.
#[derive(Debug, Clone)]
pub struct GetAudioFileTool {
    layer: ToolLayer,
}

#[async_trait]
impl Tool for GetAudioFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            GET_AUDIO_FILE,
            "Gets the specified audio file (e.g. CAR0002.mp3) from the upload directory.",
        )
        .with_string_arg("filename", "The audio filename, including the .mp3 or .wav extension.")
    }

    async fn invoke(&self, arguments: Value) -> Value {
        let args: GetAudioArgs = match parse_args(GET_AUDIO_FILE, arguments) {
            Ok(args) => args,
            Err(e) => return ToolResult::<AudioPayload>::fail(&e).to_value(),
        };
        let result = self.layer.locate_audio(&args.filename).await.map(|source| {
            (
                format!("Audio file found: {}", source.filename),
                AudioPayload {
                    audio_file_path: source.path.display().to_string(),
                    filename: source.filename,
                },
            )
        });
        let response = ToolResult::from_result(result).to_value();
        log_outcome(GET_AUDIO_FILE, &response);
        response
    }
}

/// `transcribe_audio_file(audio_file_path)`.
#[derive(Debug, Clone)]
pub struct TranscribeAudioFileTool {
    layer: ToolLayer,
}

#[async_trait]
impl Tool for TranscribeAudioFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            TRANSCRIBE_AUDIO_FILE,
            "Transcribes an audio file and saves the transcript as the session's Transcript.",
        )
        .with_string_arg("audio_file_path", "The path returned by get_audio_file.")
    }

    async fn invoke(&self, arguments: Value) -> Value {
        let args: TranscribeArgs = match parse_args(TRANSCRIBE_AUDIO_FILE, arguments) {
            Ok(args) => args,
            Err(e) => return ToolResult::<TranscriptPayload>::fail(&e).to_value(),
        };
        let result = self.layer.transcribe(&args.audio_file_path).await.map(|record| {
            (
                format!(
                    "Audio transcribed successfully and saved to {}",
                    record.display_path()
                ),
                TranscriptPayload {
                    transcript_file_path: record.location.display().to_string(),
                },
            )
        });
        let response = ToolResult::from_result(result).to_value();
        log_outcome(TRANSCRIBE_AUDIO_FILE, &response);
        response
    }
}

/// `save_processing_file(file_category, contents, audio_filename)`.
#[derive(Debug, Clone)]
pub struct SaveProcessingFileTool {
    layer: ToolLayer,
}

#[async_trait]
impl Tool for SaveProcessingFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            SAVE_PROCESSING_FILE,
            "Saves content as one of CriticReview, MedicalTemplate, AssessmentPlan or MedicalSummary.",
        )
        .with_string_arg("file_category", "The artifact category.")
        .with_optional_string_arg("contents", "The text to save. Omitted means empty.")
        .with_string_arg("audio_filename", "The session key, e.g. CAR0002.")
    }

    async fn invoke(&self, arguments: Value) -> Value {
        let args: SaveArgs = match parse_args(SAVE_PROCESSING_FILE, arguments) {
            Ok(args) => args,
            Err(e) => return ToolResult::<SavePayload>::fail(&e).to_value(),
        };
        let contents = args.contents.unwrap_or_default();
        let result = self
            .layer
            .save_artifact(&args.file_category, &contents, &args.audio_filename)
            .await
            .map(|record| {
                (
                    format!(
                        "{} saved successfully to {} ({} bytes)",
                        record.category,
                        record.display_path(),
                        record.bytes
                    ),
                    SavePayload {
                        file_path: record.location.display().to_string(),
                    },
                )
            });
        let response = ToolResult::from_result(result).to_value();
        log_outcome(SAVE_PROCESSING_FILE, &response);
        response
    }
}

/// `read_processing_file(file_category, audio_filename)`.
#[derive(Debug, Clone)]
pub struct ReadProcessingFileTool {
    layer: ToolLayer,
}

#[async_trait]
impl Tool for ReadProcessingFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            READ_PROCESSING_FILE,
            "Reads one of Transcript, CriticReview, MedicalTemplate, AssessmentPlan or MedicalSummary.",
        )
        .with_string_arg("file_category", "The artifact category.")
        .with_string_arg("audio_filename", "The session key, e.g. CAR0002.")
    }

    async fn invoke(&self, arguments: Value) -> Value {
        let args: ReadArgs = match parse_args(READ_PROCESSING_FILE, arguments) {
            Ok(args) => args,
            Err(e) => return ToolResult::<ReadPayload>::fail(&e).to_value(),
        };
        let result = self
            .layer
            .read_artifact(&args.file_category, &args.audio_filename)
            .await
            .map(|artifact| {
                (
                    format!(
                        "{} file read successfully: {}/{} ({} bytes)",
                        artifact.category,
                        artifact.session_key,
                        artifact.category.file_name(),
                        artifact.content.len()
                    ),
                    ReadPayload {
                        file_path: artifact.location.display().to_string(),
                        content: artifact.content,
                    },
                )
            });
        let response = ToolResult::from_result(result).to_value();
        log_outcome(READ_PROCESSING_FILE, &response);
        response
    }
}

/// Registers the four tools over `layer`.
pub fn register_builtin_tools(registry: &ToolRegistry, layer: &ToolLayer) {
    registry.register(Arc::new(GetAudioFileTool { layer: layer.clone() }));
    registry.register(Arc::new(TranscribeAudioFileTool { layer: layer.clone() }));
    registry.register(Arc::new(SaveProcessingFileTool { layer: layer.clone() }));
    registry.register(Arc::new(ReadProcessingFileTool { layer: layer.clone() }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockModelClient;
    use crate::store::ArtifactStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup() -> (tempfile::TempDir, ToolRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("upload");
        std::fs::create_dir_all(&upload).unwrap();
        let layer = ToolLayer::new(
            upload,
            ArtifactStore::new(dir.path().join("processing_files")),
            Arc::new(MockModelClient::new()),
        );
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry, &layer);
        (dir, registry)
    }

    async fn invoke(registry: &ToolRegistry, name: &str, args: Value) -> Value {
        registry.get(name).unwrap().invoke(args).await
    }

    #[test]
    fn test_all_tools_registered() {
        let (_dir, registry) = setup();
        assert_eq!(
            registry.list_tools(),
            vec![
                GET_AUDIO_FILE,
                READ_PROCESSING_FILE,
                SAVE_PROCESSING_FILE,
                TRANSCRIBE_AUDIO_FILE
            ]
        );
    }

    #[tokio::test]
    async fn test_get_audio_file_response_shape() {
        let (dir, registry) = setup();
        std::fs::write(dir.path().join("upload/CAR0002.mp3"), b"ID3").unwrap();

        let response = invoke(&registry, GET_AUDIO_FILE, json!({"filename": "CAR0002.mp3"})).await;
        assert_eq!(response["success"], json!(true));
        assert_eq!(response["filename"], json!("CAR0002.mp3"));
        assert!(response["audio_file_path"].as_str().unwrap().ends_with("upload/CAR0002.mp3"));
    }

    #[tokio::test]
    async fn test_failed_read_has_blank_payload() {
        let (_dir, registry) = setup();
        let response = invoke(
            &registry,
            READ_PROCESSING_FILE,
            json!({"file_category": "CriticReview", "audio_filename": ""}),
        )
        .await;
        assert_eq!(
            response,
            json!({
                "success": false,
                "message": "Audio filename cannot be empty.",
                "error_kind": "EmptySessionKey",
                "file_path": "",
                "content": "",
            })
        );
    }

    #[tokio::test]
    async fn test_save_then_read() {
        let (_dir, registry) = setup();
        let saved = invoke(
            &registry,
            SAVE_PROCESSING_FILE,
            json!({"file_category": "MedicalSummary", "contents": "Rest.", "audio_filename": "CAR0002"}),
        )
        .await;
        assert_eq!(saved["success"], json!(true));
        assert_eq!(
            saved["message"],
            json!("MedicalSummary saved successfully to CAR0002/MedicalSummary.txt (5 bytes)")
        );

        let read = invoke(
            &registry,
            READ_PROCESSING_FILE,
            json!({"file_category": "MedicalSummary", "audio_filename": "CAR0002"}),
        )
        .await;
        assert_eq!(read["content"], json!("Rest."));
    }

    #[tokio::test]
    async fn test_save_without_contents_is_empty() {
        let (_dir, registry) = setup();
        let saved = invoke(
            &registry,
            SAVE_PROCESSING_FILE,
            json!({"file_category": "AssessmentPlan", "audio_filename": "CAR0002"}),
        )
        .await;
        assert_eq!(saved["success"], json!(true));
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let (_dir, registry) = setup();
        let response = invoke(&registry, GET_AUDIO_FILE, json!({})).await;
        assert_eq!(response["success"], json!(false));
        assert!(response["message"].as_str().unwrap().contains("filename"));
    }

    #[tokio::test]
    async fn test_unparseable_arguments_use_failure_shape() {
        let (_dir, registry) = setup();
        let cases = [
            (GET_AUDIO_FILE, json!({}), vec!["audio_file_path", "filename"]),
            (TRANSCRIBE_AUDIO_FILE, json!({"audio_file_path": 7}), vec!["transcript_file_path"]),
            (SAVE_PROCESSING_FILE, json!({"file_category": "CriticReview"}), vec!["file_path"]),
            (READ_PROCESSING_FILE, json!("CriticReview"), vec!["file_path", "content"]),
        ];
        for (tool, args, blank_fields) in cases {
            let response = invoke(&registry, tool, args).await;
            assert_eq!(response["success"], json!(false), "{tool}");
            assert_eq!(response["error_kind"], json!("InvalidArguments"), "{tool}");
            assert!(response["message"].as_str().unwrap().starts_with("Invalid arguments for"));
            for field in blank_fields {
                assert_eq!(response[field], json!(""), "{tool}.{field}");
            }
        }
    }

    #[test]
    fn test_contents_is_optional_in_schema() {
        let (_dir, registry) = setup();
        let definition = registry.get(SAVE_PROCESSING_FILE).unwrap().definition();
        assert_eq!(definition.required_args(), vec!["file_category", "audio_filename"]);
        assert_eq!(definition.input_schema["properties"]["contents"]["type"], "string");
    }
}
