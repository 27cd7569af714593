//! Source audio references.

use crate::errors::ArtifactError;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Supported audio container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG layer 3.
    Mp3,
    /// RIFF WAVE.
    Wav,
}

impl AudioFormat {
    /// Detects the format from a path's extension, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::UnsupportedFormat`] for anything other than
    /// `.mp3` or `.wav`.
    pub fn from_path(path: &Path) -> Result<Self, ArtifactError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "" => Err(ArtifactError::unsupported_format("")),
            other => Err(ArtifactError::unsupported_format(format!(".{other}"))),
        }
    }

    /// Returns the MIME type sent alongside inline audio.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
        }
    }
}

/// A validated reference to an uploaded recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    /// The filename as supplied by the user.
    pub filename: String,
    /// Absolute path inside the upload directory.
    pub path: PathBuf,
    /// Detected format.
    pub format: AudioFormat,
}

/// Rejects names that are not a single plain path segment.
pub(crate) fn check_plain_filename(filename: &str) -> Result<&str, ArtifactError> {
    let name = filename.trim();
    let mut components = Path::new(name).components();
    let single_segment =
        matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
    if name.is_empty() || name.contains(['/', '\\', '\0']) || !single_segment {
        return Err(ArtifactError::file_not_found(filename));
    }
    Ok(name)
}

pub(crate) async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// Copies a local recording into the upload directory, creating it if needed.
///
/// Returns the reference to the copy. An existing upload with the same name
/// is replaced.
pub async fn import_audio(upload_dir: &Path, source: &Path) -> Result<AudioSource, ArtifactError> {
    if !is_file(source).await {
        return Err(ArtifactError::file_not_found(source.display().to_string()));
    }
    let format = AudioFormat::from_path(source)?;
    let filename = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ArtifactError::file_not_found(source.display().to_string()))?
        .to_string();

    fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ArtifactError::io(&e))?;
    let target = upload_dir.join(&filename);
    let bytes = fs::copy(source, &target)
        .await
        .map_err(|e| ArtifactError::io(&e))?;

    info!(filename = %filename, bytes, "Audio imported into upload directory");
    Ok(AudioSource {
        filename,
        path: target,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_format_is_case_insensitive() {
        assert_eq!(AudioFormat::from_path(Path::new("CAR0002.MP3")).unwrap(), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path(Path::new("a.Wav")).unwrap(), AudioFormat::Wav);
    }

    #[test]
    fn test_unsupported_format_reports_extension() {
        let err = AudioFormat::from_path(Path::new("call.ogg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(err.to_string().contains(".ogg"));
        assert!(AudioFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mpeg");
        assert_eq!(AudioFormat::Wav.mime_type(), "audio/wav");
    }

    #[test]
    fn test_plain_filename() {
        assert_eq!(check_plain_filename(" CAR0002.mp3 ").unwrap(), "CAR0002.mp3");
        for bad in ["", "../CAR0002.mp3", "a/b.mp3", "a\\b.mp3", "..", "."] {
            assert_eq!(check_plain_filename(bad).unwrap_err().kind(), ErrorKind::FileNotFound, "{bad}");
        }
    }

    #[test]
    fn test_dots_inside_a_name_are_plain() {
        for good in ["x..mp3", "CAR0002..final.wav", "visit.2024..mp3"] {
            assert_eq!(check_plain_filename(good).unwrap(), good);
        }
    }

    #[tokio::test]
    async fn test_import_audio_copies() {
        let src_dir = tempfile::tempdir().unwrap();
        let upload = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("CAR0002.mp3");
        std::fs::write(&source, b"ID3").unwrap();

        let imported = import_audio(&upload.path().join("upload"), &source).await.unwrap();
        assert_eq!(imported.filename, "CAR0002.mp3");
        assert!(imported.path.ends_with("upload/CAR0002.mp3"));
        assert_eq!(std::fs::read(&imported.path).unwrap(), b"ID3");
    }

    #[tokio::test]
    async fn test_import_rejects_unsupported() {
        let src_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("notes.txt");
        std::fs::write(&source, b"x").unwrap();

        let err = import_audio(src_dir.path(), &source).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }
}
