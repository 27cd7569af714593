//! The four artifact operations behind the callable tools.

use super::audio::{check_plain_filename, is_file, AudioFormat, AudioSource};
use crate::core::{Artifact, ArtifactCategory, ArtifactRecord, SessionKey};
use crate::errors::ArtifactError;
use crate::prompts;
use crate::providers::{Content, ModelClient, ModelRequest, Part, Role};
use crate::store::ArtifactStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

/// Locates audio, transcribes it and moves artifacts in and out of the store.
///
/// Every operation validates its inputs before touching the filesystem and
/// reports failures as [`ArtifactError`] values; nothing here panics.
#[derive(Clone)]
pub struct ToolLayer {
    upload_dir: PathBuf,
    store: ArtifactStore,
    model: Arc<dyn ModelClient>,
    transcription_model: Option<String>,
}

impl std::fmt::Debug for ToolLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLayer")
            .field("upload_dir", &self.upload_dir)
            .field("store", &self.store)
            .field("transcription_model", &self.transcription_model)
            .finish_non_exhaustive()
    }
}

impl ToolLayer {
    /// Creates a layer over an upload directory, a store and a model.
    #[must_use]
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        store: ArtifactStore,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            store,
            model,
            transcription_model: None,
        }
    }

    /// Uses a specific model for transcription instead of the client default.
    #[must_use]
    pub fn with_transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = Some(model.into());
        self
    }

    /// Returns the upload directory.
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Returns the artifact store.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Resolves `filename` inside the upload directory.
    ///
    /// Checks, in order: the upload directory exists, the file exists, the
    /// extension is `.mp3` or `.wav`. The file is never opened.
    pub async fn locate_audio(&self, filename: &str) -> Result<AudioSource, ArtifactError> {
        let upload_dir = match fs::canonicalize(&self.upload_dir).await {
            Ok(dir) if fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) => dir,
            _ => {
                return Err(ArtifactError::DirectoryMissing {
                    path: self.upload_dir.display().to_string(),
                })
            }
        };

        let name = check_plain_filename(filename)?;
        let path = upload_dir.join(name);
        if !is_file(&path).await {
            return Err(ArtifactError::file_not_found(name));
        }
        let format = AudioFormat::from_path(&path)?;

        info!(filename = %name, path = %path.display(), "Audio file located");
        Ok(AudioSource {
            filename: name.to_string(),
            path,
            format,
        })
    }

    /// Transcribes the recording at `audio_path` and stores the transcript
    /// under the recording's stem.
    ///
    /// Makes exactly one model call; retrying is left to the caller.
    pub async fn transcribe(&self, audio_path: &str) -> Result<ArtifactRecord, ArtifactError> {
        let path = Path::new(audio_path.trim());
        if audio_path.trim().is_empty() || !is_file(path).await {
            return Err(ArtifactError::file_not_found(audio_path));
        }
        let format = AudioFormat::from_path(path)?;
        let session = SessionKey::from_audio_path(path)?;

        let audio = fs::read(path).await.map_err(|e| ArtifactError::io(&e))?;
        let mut request = ModelRequest::new().with_content(Content {
            role: Role::User,
            parts: vec![
                Part::Text(prompts::TRANSCRIPTION.to_string()),
                Part::InlineData {
                    mime_type: format.mime_type().to_string(),
                    data: audio,
                },
            ],
        });
        if let Some(ref model) = self.transcription_model {
            request = request.with_model(model.clone());
        }

        let response = self.model.generate(request).await.map_err(|e| {
            warn!(session = %session, error = %e, "Transcription call failed");
            ArtifactError::from(e)
        })?;
        if response.text.trim().is_empty() {
            return Err(ArtifactError::Model {
                reason: "transcription returned no text".to_string(),
            });
        }

        self.store
            .write(&session, ArtifactCategory::Transcript, &response.text)
            .await
    }

    /// Writes a generated artifact. `Transcript` is not accepted here.
    pub async fn save_artifact(
        &self,
        category: &str,
        content: &str,
        session_key: &str,
    ) -> Result<ArtifactRecord, ArtifactError> {
        let session = SessionKey::parse(session_key)?;
        let category = ArtifactCategory::parse_generated(category)?;
        self.store.write(&session, category, content).await
    }

    /// Reads any artifact, including the transcript.
    pub async fn read_artifact(
        &self,
        category: &str,
        session_key: &str,
    ) -> Result<Artifact, ArtifactError> {
        let session = SessionKey::parse(session_key)?;
        let category = ArtifactCategory::parse_readable(category)?;
        self.store.read(&session, category).await
    }

    /// Copies a local recording into the upload directory.
    pub async fn import_audio(&self, source: &Path) -> Result<AudioSource, ArtifactError> {
        super::audio::import_audio(&self.upload_dir, source).await
    }
}
