//! Audio intake: locate the recording, then transcribe it.

use super::Stage;
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::ArtifactError;
use crate::events::names;
use crate::tools::{ToolLayer, GET_AUDIO_FILE, TRANSCRIBE_AUDIO_FILE};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Produces the session transcript from the filename on the context.
///
/// Transcription only runs on a path returned by a successful locate.
#[derive(Debug, Clone)]
pub struct AudioIntake {
    name: String,
    layer: ToolLayer,
}

impl AudioIntake {
    /// Stage name used in reports.
    pub const NAME: &'static str = "audio_processor";

    /// Creates the stage.
    #[must_use]
    pub fn new(layer: ToolLayer) -> Self {
        Self {
            name: Self::NAME.to_string(),
            layer,
        }
    }
}

#[async_trait]
impl Stage for AudioIntake {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let Some(filename) = ctx.filename() else {
            return StageOutput::from_error(&ArtifactError::file_not_found(""));
        };

        ctx.emit(names::TOOL_INVOKED, json!({ "tool": GET_AUDIO_FILE })).await;
        let source = match self.layer.locate_audio(filename).await {
            Ok(source) => source,
            Err(e) => return StageOutput::from_error(&e),
        };

        let Some(path) = source.path.to_str() else {
            return StageOutput::from_error(&ArtifactError::file_not_found(
                source.path.display().to_string(),
            ));
        };
        ctx.emit(names::TOOL_INVOKED, json!({ "tool": TRANSCRIBE_AUDIO_FILE })).await;
        match self.layer.transcribe(path).await {
            Ok(record) => {
                info!(session = %record.session_key, bytes = record.bytes, "Transcript ready");
                StageOutput::ok_text(format!(
                    "Audio transcribed successfully and saved to {}",
                    record.display_path()
                ))
                .add_data("session_key", json!(record.session_key.as_str()))
                .add_data("audio_file_path", json!(path))
                .with_artifact(record)
            }
            Err(e) => StageOutput::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArtifactCategory;
    use crate::errors::ErrorKind;
    use crate::providers::{MockModelClient, ModelResponse};
    use crate::store::ArtifactStore;
    use std::sync::Arc;

    fn layer(dir: &tempfile::TempDir, mock: MockModelClient) -> ToolLayer {
        let upload = dir.path().join("upload");
        std::fs::create_dir_all(&upload).unwrap();
        ToolLayer::new(upload, ArtifactStore::new(dir.path().join("processing_files")), Arc::new(mock))
    }

    #[tokio::test]
    async fn test_intake_writes_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelClient::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(ModelResponse::text("Doctor: Hello.")));
        let layer = layer(&dir, mock);
        std::fs::write(layer.upload_dir().join("CAR0002.mp3"), b"ID3").unwrap();

        let stage = AudioIntake::new(layer);
        let output = stage
            .execute(&StageContext::detached().with_filename("CAR0002.mp3"))
            .await;

        assert!(output.is_success(), "{:?}", output.error);
        assert_eq!(output.get("session_key"), Some(&json!("CAR0002")));
        let record = output.artifact.unwrap();
        assert_eq!(record.category, ArtifactCategory::Transcript);
        assert!(record.location.ends_with("processing_files/CAR0002/Transcript.txt"));
    }

    #[tokio::test]
    async fn test_locate_failure_skips_transcription() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelClient::new();
        mock.expect_generate().never();
        let stage = AudioIntake::new(layer(&dir, mock));

        let output = stage
            .execute(&StageContext::detached().with_filename("CAR0009.mp3"))
            .await;
        assert_eq!(output.error_kind, Some(ErrorKind::FileNotFound));
    }

    #[tokio::test]
    async fn test_missing_filename() {
        let dir = tempfile::tempdir().unwrap();
        let stage = AudioIntake::new(layer(&dir, MockModelClient::new()));
        let output = stage.execute(&StageContext::detached()).await;
        assert!(output.is_failure());
    }
}
