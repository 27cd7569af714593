//! Ready-wired workspaces for end-to-end tests.

use super::ScriptedModel;
use crate::core::ArtifactCategory;
use crate::pipeline::ConsultationPipeline;
use crate::prompts;
use crate::providers::ModelClient;
use crate::stages::StageCatalog;
use crate::store::ArtifactStore;
use crate::tools::{register_builtin_tools, ToolLayer, ToolRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upload and processing directories under one root, with the tool layer,
/// registry and catalog wired over a shared model.
#[derive(Debug)]
pub struct TestWorkspace {
    /// Directory holding uploaded recordings.
    pub upload_dir: PathBuf,
    /// The artifact store.
    pub store: ArtifactStore,
    /// The tool layer.
    pub layer: ToolLayer,
    /// Registry holding the builtin tools.
    pub registry: Arc<ToolRegistry>,
    /// Catalog building every stage.
    pub catalog: StageCatalog,
}

impl TestWorkspace {
    /// Creates `<root>/upload` and wires everything over `model`.
    ///
    /// # Panics
    ///
    /// Panics if the upload directory cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(root: &Path, model: Arc<dyn ModelClient>) -> Self {
        let upload_dir = root.join("upload");
        std::fs::create_dir_all(&upload_dir).expect("create upload dir");
        let store = ArtifactStore::new(root.join("processing_files"));
        let layer = ToolLayer::new(upload_dir.clone(), store.clone(), model.clone());
        let registry = Arc::new(ToolRegistry::new());
        register_builtin_tools(&registry, &layer);
        let catalog = StageCatalog::new(layer.clone(), model, registry.clone());
        Self {
            upload_dir,
            store,
            layer,
            registry,
            catalog,
        }
    }

    /// Places a recording in the upload directory.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[allow(clippy::expect_used)]
    pub fn add_audio(&self, filename: &str, bytes: &[u8]) -> PathBuf {
        let path = self.upload_dir.join(filename);
        std::fs::write(&path, bytes).expect("write audio");
        path
    }

    /// Builds the consultation pipeline without branch timeouts.
    #[must_use]
    pub fn pipeline(&self) -> ConsultationPipeline {
        ConsultationPipeline::from_catalog(&self.catalog, None)
    }
}

/// Texts a scripted consultation produces, so tests can compare artifacts.
pub mod script {
    /// Transcript returned by the transcription rule.
    pub const TRANSCRIPT: &str =
        "Doctor: What brings you in today?\nPatient: My right knee has been swollen for a week.";
    /// Template content saved by the template agent.
    pub const TEMPLATE: &str = "Chief complaint: right knee swelling, one week.\nMedications: Not discussed.";
    /// The validator's review.
    pub const REVIEW: &str = "No discrepancies found.";
    /// Plan content saved by the planner.
    pub const PLAN: &str = "Working diagnosis: knee effusion. Plan: X-ray, NSAIDs, review in 2 weeks.";
    /// Review content saved by the critic.
    pub const CRITIQUE: &str = "Ask about trauma and fever.";
    /// The planner's, critic's and template agent's closing line.
    pub const SAVED: &str = "Saved.";
    /// Summary returned as plain text, which the worker saves itself.
    pub const SUMMARY: &str = "Your knee is swollen. You will have an X-ray.";
}

/// A model that plays a full, successful consultation for `session`.
///
/// The summariser answers in plain text without calling the save tool, so
/// both commit paths of a worker are exercised.
#[must_use]
pub fn scripted_consultation(session: &str) -> ScriptedModel {
    ScriptedModel::new()
        .reply(prompts::TRANSCRIPTION, script::TRANSCRIPT)
        .save_then_reply(
            prompts::MEDICAL_TEMPLATE,
            session,
            ArtifactCategory::MedicalTemplate,
            script::TEMPLATE,
            script::SAVED,
        )
        .reply(prompts::TEMPLATE_VALIDATOR, script::REVIEW)
        .save_then_reply(
            prompts::ASSESSMENT_PLANNER,
            session,
            ArtifactCategory::AssessmentPlan,
            script::PLAN,
            script::SAVED,
        )
        .save_then_reply(
            prompts::CRITIC,
            session,
            ArtifactCategory::CriticReview,
            script::CRITIQUE,
            script::SAVED,
        )
        .reply(prompts::SUMMARISER, script::SUMMARY)
}
