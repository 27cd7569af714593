//! Session keys.

use crate::errors::ArtifactError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Identifier scoping every artifact of one consultation.
///
/// A session key is derived from the audio filename without its extension
/// (`CAR0002.mp3` becomes `CAR0002`) and is used verbatim as a directory name,
/// so it must be a single safe path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionKey(String);

impl SessionKey {
    /// Parses and sanitizes a session key. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::EmptySessionKey`] for blank input and
    /// [`ArtifactError::InvalidSessionKey`] for anything that is not a single
    /// path segment.
    pub fn parse(raw: &str) -> Result<Self, ArtifactError> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(ArtifactError::EmptySessionKey);
        }
        if key.contains(['/', '\\', '\0']) {
            return Err(ArtifactError::invalid_session_key(
                key,
                "must not contain path separators",
            ));
        }
        if key.starts_with('.') {
            return Err(ArtifactError::invalid_session_key(key, "must not start with '.'"));
        }
        if key.chars().any(char::is_control) {
            return Err(ArtifactError::invalid_session_key(
                key,
                "must not contain control characters",
            ));
        }
        Ok(Self(key.to_string()))
    }

    /// Derives the session key from an audio file path by stripping the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the path has no file stem or the stem is not a
    /// valid key.
    pub fn from_audio_path(path: &Path) -> Result<Self, ArtifactError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ArtifactError::file_not_found(path.display().to_string()))?;
        Self::parse(stem)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionKey {
    type Error = ArtifactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionKey> for String {
    fn from(key: SessionKey) -> Self {
        key.0
    }
}
