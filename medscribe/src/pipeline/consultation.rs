//! The full consultation run: transcript first, then the fan-out.

use super::{run_stage, BranchReport, ParallelComposer, PipelineReport};
use crate::context::StageContext;
use crate::core::{ArtifactCategory, SessionKey, StageOutput};
use crate::errors::ArtifactError;
use crate::stages::{Stage, StageCatalog};
use crate::store::ArtifactStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Intake followed by the parallel analysis.
///
/// The fan-out never launches before the transcript write has completed:
/// it is started only after intake returns a successful output carrying
/// the transcript record.
#[derive(Debug, Clone)]
pub struct ConsultationPipeline {
    intake: Arc<dyn Stage>,
    fan_out: ParallelComposer,
    store: ArtifactStore,
}

impl ConsultationPipeline {
    /// Creates a pipeline from its parts.
    #[must_use]
    pub fn new(intake: Arc<dyn Stage>, fan_out: ParallelComposer, store: ArtifactStore) -> Self {
        Self {
            intake,
            fan_out,
            store,
        }
    }

    /// Wires the standard stages from `catalog`.
    #[must_use]
    pub fn from_catalog(catalog: &StageCatalog, branch_timeout: Option<Duration>) -> Self {
        Self::new(
            Arc::new(catalog.audio_processor()),
            ParallelComposer::consultation(catalog).with_branch_timeout(branch_timeout),
            catalog.layer().store().clone(),
        )
    }

    /// Returns the fan-out.
    #[must_use]
    pub fn fan_out(&self) -> &ParallelComposer {
        &self.fan_out
    }

    /// Transcribes the recording named on `ctx`, then runs the fan-out.
    pub async fn run(&self, ctx: &StageContext) -> PipelineReport {
        let (output, duration_ms) = run_stage(self.intake.as_ref(), ctx).await;
        let session_key = Self::session_of(&output);
        let intake = BranchReport::from_output(self.intake.name(), output, duration_ms);

        let Some(key) = session_key.filter(|_| intake.is_success()) else {
            warn!(
                filename = ctx.filename().unwrap_or_default(),
                error = intake.error.as_deref().unwrap_or_default(),
                "Intake failed, analysis not started"
            );
            return PipelineReport {
                session_key: None,
                intake: Some(intake),
                fan_out: None,
            };
        };

        let fan_out = self.fan_out.run(&ctx.clone().with_session_key(key.clone())).await;
        info!(session = %key, summary = %fan_out.summary(), "Consultation processed");
        PipelineReport {
            session_key: Some(key),
            intake: Some(intake),
            fan_out: Some(fan_out),
        }
    }

    /// Runs only the fan-out over a transcript that is already stored.
    ///
    /// # Errors
    ///
    /// Returns the store error if the session has no transcript.
    pub async fn analyse(
        &self,
        ctx: &StageContext,
        key: &SessionKey,
    ) -> Result<PipelineReport, ArtifactError> {
        self.store.read(key, ArtifactCategory::Transcript).await?;
        let fan_out = self.fan_out.run(&ctx.clone().with_session_key(key.clone())).await;
        Ok(PipelineReport {
            session_key: Some(key.clone()),
            intake: None,
            fan_out: Some(fan_out),
        })
    }

    fn session_of(output: &StageOutput) -> Option<SessionKey> {
        if let Some(ref record) = output.artifact {
            return Some(record.session_key.clone());
        }
        output
            .get("session_key")
            .and_then(serde_json::Value::as_str)
            .and_then(|raw| SessionKey::parse(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::{RecordingStage, StaticStage};

    #[tokio::test]
    async fn test_failed_intake_skips_fan_out() {
        let log = RecordingStage::shared_log();
        let branch = Arc::new(RecordingStage::new("critic", log));
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ConsultationPipeline::new(
            Arc::new(StaticStage::fail("audio_processor", "Audio file 'x.mp3' not found")),
            ParallelComposer::new("fan", vec![branch.clone()]),
            ArtifactStore::new(dir.path()),
        );

        let report = pipeline.run(&StageContext::detached().with_filename("x.mp3")).await;
        assert!(report.fan_out.is_none());
        assert!(report.intake_failure().is_some());
        assert_eq!(branch.calls(), 0);
    }

    #[tokio::test]
    async fn test_session_key_reaches_branches() {
        let log = RecordingStage::shared_log();
        let branch = Arc::new(RecordingStage::new("critic", log));
        let dir = tempfile::tempdir().unwrap();
        let intake = StaticStage::ok("audio_processor", "transcribed")
            .with_data("session_key", serde_json::json!("CAR0002"));
        let pipeline = ConsultationPipeline::new(
            Arc::new(intake),
            ParallelComposer::new("fan", vec![branch.clone()]),
            ArtifactStore::new(dir.path()),
        );

        let report = pipeline.run(&StageContext::detached()).await;
        assert!(report.is_complete());
        assert_eq!(report.session_key.unwrap().as_str(), "CAR0002");
        assert_eq!(branch.sessions(), vec![Some("CAR0002".to_string())]);
    }

    #[tokio::test]
    async fn test_analyse_requires_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ConsultationPipeline::new(
            Arc::new(StaticStage::ok("audio_processor", "")),
            ParallelComposer::new("fan", vec![]),
            ArtifactStore::new(dir.path()),
        );
        let key = SessionKey::parse("CAR0002").unwrap();
        let err = pipeline
            .analyse(&StageContext::detached(), &key)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
    }
}
