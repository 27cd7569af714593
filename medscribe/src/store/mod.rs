//! File-backed artifact store.
//!
//! Layout: `<root>/<session-key>/<Category>.txt`, plain UTF-8 text. There is
//! no cache; every call goes to the filesystem, so independent writers on
//! disjoint categories never observe stale state.

use crate::core::{Artifact, ArtifactCategory, ArtifactRecord, SessionKey};
use crate::errors::ArtifactError;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Persists text artifacts keyed by session and category.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding a session's artifacts.
    #[must_use]
    pub fn namespace(&self, session: &SessionKey) -> PathBuf {
        self.root.join(session.as_str())
    }

    /// Returns where an artifact lives, whether or not it exists.
    #[must_use]
    pub fn location(&self, session: &SessionKey, category: ArtifactCategory) -> PathBuf {
        self.namespace(session).join(category.file_name())
    }

    /// Writes `content` verbatim, replacing any previous artifact.
    ///
    /// The content is written to a hidden temporary file in the session
    /// directory and renamed into place, so readers see either the old or
    /// the new text.
    pub async fn write(
        &self,
        session: &SessionKey,
        category: ArtifactCategory,
        content: &str,
    ) -> Result<ArtifactRecord, ArtifactError> {
        let dir = self.namespace(session);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ArtifactError::io(&e))?;

        let location = dir.join(category.file_name());
        let staging = dir.join(format!(".{}.tmp", category.file_name()));
        fs::write(&staging, content.as_bytes())
            .await
            .map_err(|e| ArtifactError::io(&e))?;
        if let Err(e) = fs::rename(&staging, &location).await {
            let _ = fs::remove_file(&staging).await;
            return Err(ArtifactError::io(&e));
        }

        info!(
            session = %session,
            category = %category,
            bytes = content.len(),
            location = %location.display(),
            "Artifact written"
        );
        Ok(ArtifactRecord::new(
            session.clone(),
            category,
            location,
            content.len(),
        ))
    }

    /// Reads an artifact back.
    ///
    /// Fails with `NamespaceNotFound` when nothing was ever written for the
    /// session, `ArtifactNotFound` when the category is absent and
    /// `DecodingError` when the bytes are not UTF-8.
    pub async fn read(
        &self,
        session: &SessionKey,
        category: ArtifactCategory,
    ) -> Result<Artifact, ArtifactError> {
        let dir = self.namespace(session);
        if !is_dir(&dir).await {
            return Err(ArtifactError::NamespaceNotFound {
                session: session.to_string(),
            });
        }

        let location = dir.join(category.file_name());
        let bytes = match fs::read(&location).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(ArtifactError::ArtifactNotFound {
                    session: session.to_string(),
                    category: category.to_string(),
                });
            }
            Err(e) => return Err(ArtifactError::io(&e)),
        };

        let content = String::from_utf8(bytes).map_err(|e| ArtifactError::DecodingError {
            category: category.to_string(),
            reason: e.utf8_error().to_string(),
        })?;

        debug!(session = %session, category = %category, bytes = content.len(), "Artifact read");
        Ok(Artifact {
            session_key: session.clone(),
            category,
            content,
            location,
        })
    }

    /// Returns true if the artifact file exists.
    pub async fn exists(&self, session: &SessionKey, category: ArtifactCategory) -> bool {
        fs::try_exists(self.location(session, category))
            .await
            .unwrap_or(false)
    }

    /// Lists the categories present for a session, in canonical order.
    pub async fn list(&self, session: &SessionKey) -> Vec<ArtifactCategory> {
        let mut present = Vec::new();
        for category in ArtifactCategory::ALL {
            if self.exists(session, category).await {
                present.push(category);
            }
        }
        present
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn key(raw: &str) -> SessionKey {
        SessionKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let session = key("CAR0002");

        let record = store
            .write(&session, ArtifactCategory::MedicalSummary, "Take ibuprofen.\n")
            .await
            .unwrap();
        assert_eq!(record.bytes, 16);
        assert!(record.location.ends_with("CAR0002/MedicalSummary.txt"));

        let artifact = store.read(&session, ArtifactCategory::MedicalSummary).await.unwrap();
        assert_eq!(artifact.content, "Take ibuprofen.\n");
        assert_eq!(artifact.location, record.location);
    }

    #[tokio::test]
    async fn test_overwrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let session = key("CAR0002");

        store.write(&session, ArtifactCategory::CriticReview, "first").await.unwrap();
        store.write(&session, ArtifactCategory::CriticReview, "second").await.unwrap();

        let artifact = store.read(&session, ArtifactCategory::CriticReview).await.unwrap();
        assert_eq!(artifact.content, "second");
    }

    #[tokio::test]
    async fn test_no_staging_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let session = key("CAR0002");
        store.write(&session, ArtifactCategory::AssessmentPlan, "plan").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(store.namespace(&session))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["AssessmentPlan.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_read_missing_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let err = store.read(&key("NOPE"), ArtifactCategory::Transcript).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
        assert_eq!(err.to_string(), "Processing directory not found: processing_files/NOPE");
    }

    #[tokio::test]
    async fn test_read_missing_category() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let session = key("CAR0002");
        store.write(&session, ArtifactCategory::Transcript, "Doctor: Hi").await.unwrap();

        let err = store.read(&session, ArtifactCategory::CriticReview).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactNotFound);
        assert_eq!(err.to_string(), "CriticReview file not found: CAR0002/CriticReview.txt");
    }

    #[tokio::test]
    async fn test_read_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let session = key("CAR0002");
        std::fs::create_dir_all(store.namespace(&session)).unwrap();
        std::fs::write(
            store.location(&session, ArtifactCategory::Transcript),
            [0xff, 0xfe, 0x00],
        )
        .unwrap();

        let err = store.read(&session, ArtifactCategory::Transcript).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodingError);
    }

    #[tokio::test]
    async fn test_list_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let session = key("CAR0002");

        assert!(store.list(&session).await.is_empty());
        store.write(&session, ArtifactCategory::MedicalSummary, "").await.unwrap();
        store.write(&session, ArtifactCategory::Transcript, "x").await.unwrap();

        assert!(store.exists(&session, ArtifactCategory::MedicalSummary).await);
        assert_eq!(
            store.list(&session).await,
            vec![ArtifactCategory::Transcript, ArtifactCategory::MedicalSummary]
        );
    }
}
