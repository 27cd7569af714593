//! Error types for medscribe.
//!
//! Store and tool failures share one taxonomy ([`ArtifactError`]) so that a
//! failure can cross the tool boundary as a tagged result instead of a fault.
//! Model transport failures and configuration failures have their own types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for medscribe operations.
#[derive(Debug, Error)]
pub enum MedscribeError {
    /// An artifact store or tool precondition failed.
    #[error("{0}")]
    Artifact(#[from] ArtifactError),

    /// The model capability failed.
    #[error("{0}")]
    Model(#[from] ModelError),

    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A stage execution error.
    #[error("Stage execution error: {0}")]
    StageExecution(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable identifiers for every failure a tool operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The upload directory does not exist.
    DirectoryMissing,
    /// The audio file does not exist.
    FileNotFound,
    /// The audio file extension is not `.mp3` or `.wav`.
    UnsupportedFormat,
    /// The artifact category is not in the accepted set.
    InvalidCategory,
    /// The session key is blank.
    EmptySessionKey,
    /// The session key would escape the processing directory.
    InvalidSessionKey,
    /// The session has no processing directory yet.
    NamespaceNotFound,
    /// The session exists but the category was never written.
    ArtifactNotFound,
    /// Persisted bytes are not valid UTF-8.
    DecodingError,
    /// A filesystem operation failed.
    IoFailure,
    /// The external model call failed.
    ModelFailure,
    /// A tool call's arguments did not match its declaration.
    InvalidArguments,
}

impl ErrorKind {
    /// Returns the kind as it appears in tool responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DirectoryMissing => "DirectoryMissing",
            Self::FileNotFound => "FileNotFound",
            Self::UnsupportedFormat => "UnsupportedFormat",
            Self::InvalidCategory => "InvalidCategory",
            Self::EmptySessionKey => "EmptySessionKey",
            Self::InvalidSessionKey => "InvalidSessionKey",
            Self::NamespaceNotFound => "NamespaceNotFound",
            Self::ArtifactNotFound => "ArtifactNotFound",
            Self::DecodingError => "DecodingError",
            Self::IoFailure => "IOFailure",
            Self::ModelFailure => "ModelFailure",
            Self::InvalidArguments => "InvalidArguments",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the artifact store and the tool layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    /// The upload directory is missing.
    #[error("Upload directory not found: {path}")]
    DirectoryMissing {
        /// The configured upload directory.
        path: String,
    },

    /// The audio file could not be found.
    #[error("Audio file '{name}' not found")]
    FileNotFound {
        /// The filename or path that was looked up.
        name: String,
    },

    /// The audio file has an unsupported extension.
    #[error("Invalid audio format: '{extension}'. Only .mp3 and .wav are supported.")]
    UnsupportedFormat {
        /// The offending extension, lowercased, including the dot.
        extension: String,
    },

    /// The category is not accepted by the operation.
    #[error("Invalid file category '{category}'. Must be one of: {allowed}")]
    InvalidCategory {
        /// The category that was supplied.
        category: String,
        /// Comma separated list of accepted categories.
        allowed: String,
    },

    /// The session key is blank.
    #[error("Audio filename cannot be empty.")]
    EmptySessionKey,

    /// The session key is not a safe path segment.
    #[error("Invalid session key '{key}': {reason}")]
    InvalidSessionKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No artifacts were ever written for the session.
    #[error("Processing directory not found: processing_files/{session}")]
    NamespaceNotFound {
        /// The session key.
        session: String,
    },

    /// The session exists but the category is absent.
    #[error("{category} file not found: {session}/{category}.txt")]
    ArtifactNotFound {
        /// The session key.
        session: String,
        /// The missing category.
        category: String,
    },

    /// The stored bytes are not UTF-8 text.
    #[error("Error reading {category} file - encoding issue: {reason}")]
    DecodingError {
        /// The category being read.
        category: String,
        /// The decoder message.
        reason: String,
    },

    /// A filesystem operation failed.
    #[error("IO failure: {reason}")]
    Io {
        /// The underlying message.
        reason: String,
    },

    /// The external model call failed.
    #[error("Model call failed: {reason}")]
    Model {
        /// The underlying message.
        reason: String,
    },

    /// A tool was called with arguments it cannot parse.
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// The tool name.
        tool: String,
        /// The parser message.
        reason: String,
    },
}

impl ArtifactError {
    /// Returns the stable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DirectoryMissing { .. } => ErrorKind::DirectoryMissing,
            Self::FileNotFound { .. } => ErrorKind::FileNotFound,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::InvalidCategory { .. } => ErrorKind::InvalidCategory,
            Self::EmptySessionKey => ErrorKind::EmptySessionKey,
            Self::InvalidSessionKey { .. } => ErrorKind::InvalidSessionKey,
            Self::NamespaceNotFound { .. } => ErrorKind::NamespaceNotFound,
            Self::ArtifactNotFound { .. } => ErrorKind::ArtifactNotFound,
            Self::DecodingError { .. } => ErrorKind::DecodingError,
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::Model { .. } => ErrorKind::ModelFailure,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
        }
    }

    /// Creates a file not found error.
    #[must_use]
    pub fn file_not_found(name: impl Into<String>) -> Self {
        Self::FileNotFound { name: name.into() }
    }

    /// Creates an unsupported format error.
    #[must_use]
    pub fn unsupported_format(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    /// Creates an invalid category error listing the accepted set.
    #[must_use]
    pub fn invalid_category(category: impl Into<String>, allowed: &[&str]) -> Self {
        Self::InvalidCategory {
            category: category.into(),
            allowed: allowed.join(", "),
        }
    }

    /// Creates an invalid session key error.
    #[must_use]
    pub fn invalid_session_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSessionKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Wraps an IO error.
    #[must_use]
    pub fn io(err: &std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }

    /// Returns true when the caller can fix the failure by correcting input.
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DirectoryMissing | ErrorKind::FileNotFound | ErrorKind::UnsupportedFormat
        )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind().as_str()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

impl From<ModelError> for ArtifactError {
    fn from(err: ModelError) -> Self {
        Self::Model {
            reason: err.to_string(),
        }
    }
}

/// Failures of the model capability.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The request never produced an HTTP response.
    #[error("Model transport error: {0}")]
    Transport(String),

    /// The model API answered with a non-success status.
    #[error("Model API returned HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, possibly truncated.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Model response could not be decoded: {0}")]
    Decode(String),

    /// The model returned no usable candidate.
    #[error("Model returned no candidates")]
    Empty,

    /// The client is misconfigured (for example a missing API key).
    #[error("Model client misconfigured: {0}")]
    Config(String),
}

impl ModelError {
    /// Returns true if repeating the request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Empty | Self::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be merged or deserialized.
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is present but unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_error_kinds() {
        assert_eq!(ArtifactError::EmptySessionKey.kind(), ErrorKind::EmptySessionKey);
        assert_eq!(
            ArtifactError::file_not_found("CAR0002.mp3").kind(),
            ErrorKind::FileNotFound
        );
        assert_eq!(
            ArtifactError::Io { reason: "disk full".into() }.kind().as_str(),
            "IOFailure"
        );
    }

    #[test]
    fn test_invalid_category_lists_allowed() {
        let err = ArtifactError::invalid_category("Notes", &["MedicalTemplate", "CriticReview"]);
        assert!(err.to_string().contains("Notes"));
        assert!(err.to_string().contains("MedicalTemplate, CriticReview"));
    }

    #[test]
    fn test_artifact_error_to_dict() {
        let err = ArtifactError::unsupported_format(".ogg");
        let dict = err.to_dict();

        assert_eq!(dict.get("kind").unwrap(), "UnsupportedFormat");
        assert!(dict.get("message").unwrap().as_str().unwrap().contains(".ogg"));
    }

    #[test]
    fn test_user_recoverable() {
        assert!(ArtifactError::file_not_found("x.mp3").is_user_recoverable());
        assert!(!ArtifactError::EmptySessionKey.is_user_recoverable());
    }

    #[test]
    fn test_model_error_retryable() {
        assert!(ModelError::Transport("reset".into()).is_retryable());
        assert!(ModelError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(ModelError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!ModelError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!ModelError::Empty.is_retryable());
    }

    #[test]
    fn test_model_error_into_artifact_error() {
        let err: ArtifactError = ModelError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::ModelFailure);
    }
}
