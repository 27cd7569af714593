//! Artifact types returned by the store.

use super::{ArtifactCategory, SessionKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// An artifact read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// The session the artifact belongs to.
    pub session_key: SessionKey,
    /// The artifact category.
    pub category: ArtifactCategory,
    /// The text content, verbatim.
    pub content: String,
    /// Where the artifact lives on disk.
    pub location: PathBuf,
}

/// Receipt for a committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// The session the artifact belongs to.
    pub session_key: SessionKey,
    /// The artifact category.
    pub category: ArtifactCategory,
    /// Where the artifact was written.
    pub location: PathBuf,
    /// Size of the content in bytes.
    pub bytes: usize,
    /// When the write was committed.
    pub written_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Creates a receipt stamped with the current time.
    #[must_use]
    pub fn new(
        session_key: SessionKey,
        category: ArtifactCategory,
        location: PathBuf,
        bytes: usize,
    ) -> Self {
        Self {
            session_key,
            category,
            location,
            bytes,
            written_at: Utc::now(),
        }
    }

    /// Returns the `<session>/<Category>.txt` form used in messages.
    #[must_use]
    pub fn display_path(&self) -> String {
        format!("{}/{}", self.session_key, self.category.file_name())
    }

    /// Converts the receipt to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("session_key".to_string(), serde_json::json!(self.session_key.as_str()));
        map.insert("category".to_string(), serde_json::json!(self.category.as_str()));
        map.insert(
            "location".to_string(),
            serde_json::json!(self.location.display().to_string()),
        );
        map.insert("bytes".to_string(), serde_json::json!(self.bytes));
        map.insert("written_at".to_string(), serde_json::json!(self.written_at.to_rfc3339()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ArtifactRecord {
        ArtifactRecord::new(
            SessionKey::parse("CAR0002").unwrap(),
            ArtifactCategory::CriticReview,
            PathBuf::from("/tmp/processing_files/CAR0002/CriticReview.txt"),
            12,
        )
    }

    #[test]
    fn test_display_path() {
        assert_eq!(record().display_path(), "CAR0002/CriticReview.txt");
    }

    #[test]
    fn test_record_to_dict() {
        let dict = record().to_dict();
        assert_eq!(dict.get("category").unwrap(), "CriticReview");
        assert_eq!(dict.get("bytes").unwrap(), 12);
    }

    #[test]
    fn test_record_serialization() {
        let original = record();
        let json = serde_json::to_string(&original).unwrap();
        let back: ArtifactRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
