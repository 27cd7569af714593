//! Construction of the consultation agents.

use super::{ArtifactContract, AudioIntake, InstructionWorker, WorkerSpec};
use crate::core::ArtifactCategory;
use crate::prompts;
use crate::providers::ModelClient;
use crate::tools::{ToolLayer, ToolRegistry, READ_PROCESSING_FILE, SAVE_PROCESSING_FILE};
use std::sync::Arc;

/// Stage name of the template step.
pub const MEDICAL_TEMPLATE: &str = "medical_template";
/// Stage name of the template validation step.
pub const TEMPLATE_VALIDATOR: &str = "template_validator";
/// Stage name of the assessment and plan step.
pub const ASSESSMENT_PLANNER: &str = "assessment_planner";
/// Stage name of the critique step.
pub const CRITIC: &str = "critic";
/// Stage name of the patient summary step.
pub const SUMMARISER: &str = "summariser";
/// Stage name of the follow-up question answerer.
pub const FOLLOW_UP: &str = "follow_up";

const READ_AND_SAVE: &[&str] = &[READ_PROCESSING_FILE, SAVE_PROCESSING_FILE];
const READ_ONLY: &[&str] = &[READ_PROCESSING_FILE];

/// Builds every stage of a consultation run from shared collaborators.
#[derive(Clone)]
pub struct StageCatalog {
    layer: ToolLayer,
    model: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    agent_model: Option<String>,
    max_tool_turns: usize,
}

impl std::fmt::Debug for StageCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageCatalog")
            .field("layer", &self.layer)
            .field("registry", &self.registry)
            .field("agent_model", &self.agent_model)
            .field("max_tool_turns", &self.max_tool_turns)
            .finish_non_exhaustive()
    }
}

impl StageCatalog {
    /// Creates a catalog. `registry` must already hold the builtin tools.
    #[must_use]
    pub fn new(layer: ToolLayer, model: Arc<dyn ModelClient>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            layer,
            model,
            registry,
            agent_model: None,
            max_tool_turns: InstructionWorker::DEFAULT_MAX_TOOL_TURNS,
        }
    }

    /// Sets the model used by the agents.
    #[must_use]
    pub fn with_agent_model(mut self, model: impl Into<String>) -> Self {
        self.agent_model = Some(model.into());
        self
    }

    /// Sets the bound on model round-trips per agent.
    #[must_use]
    pub fn with_max_tool_turns(mut self, turns: usize) -> Self {
        self.max_tool_turns = turns;
        self
    }

    /// Returns the tool layer the stages share.
    #[must_use]
    pub fn layer(&self) -> &ToolLayer {
        &self.layer
    }

    fn worker(&self, spec: WorkerSpec) -> InstructionWorker {
        let worker = InstructionWorker::new(
            spec,
            self.model.clone(),
            self.registry.clone(),
            self.layer.store().clone(),
        )
        .with_max_tool_turns(self.max_tool_turns);
        match self.agent_model {
            Some(ref model) => worker.with_agent_model(model.clone()),
            None => worker,
        }
    }

    /// Locates and transcribes the recording.
    #[must_use]
    pub fn audio_processor(&self) -> AudioIntake {
        AudioIntake::new(self.layer.clone())
    }

    /// Populates the consultation template from the transcript.
    #[must_use]
    pub fn medical_template(&self) -> InstructionWorker {
        self.worker(
            WorkerSpec::new(MEDICAL_TEMPLATE, prompts::MEDICAL_TEMPLATE)
                .with_description("Populates the consultation template from the transcript.")
                .with_tools(READ_AND_SAVE)
                .with_contract(ArtifactContract::new(
                    &[ArtifactCategory::Transcript],
                    Some(ArtifactCategory::MedicalTemplate),
                )),
        )
    }

    /// Reviews the template against the transcript. Writes nothing.
    #[must_use]
    pub fn template_validator(&self) -> InstructionWorker {
        self.worker(
            WorkerSpec::new(TEMPLATE_VALIDATOR, prompts::TEMPLATE_VALIDATOR)
                .with_description("Flags fabrications, omissions and misattributions in the template.")
                .with_tools(READ_ONLY)
                .with_contract(ArtifactContract::new(
                    &[ArtifactCategory::Transcript, ArtifactCategory::MedicalTemplate],
                    None,
                )),
        )
    }

    /// Writes the assessment and plan.
    #[must_use]
    pub fn assessment_planner(&self) -> InstructionWorker {
        self.worker(
            WorkerSpec::new(ASSESSMENT_PLANNER, prompts::ASSESSMENT_PLANNER)
                .with_description("Writes the working diagnosis, differential and plan.")
                .with_tools(READ_AND_SAVE)
                .with_contract(ArtifactContract::new(
                    &[ArtifactCategory::Transcript],
                    Some(ArtifactCategory::AssessmentPlan),
                )),
        )
    }

    /// Critiques the consultation technique.
    #[must_use]
    pub fn critic(&self) -> InstructionWorker {
        self.worker(
            WorkerSpec::new(CRITIC, prompts::CRITIC)
                .with_description("Gives actionable feedback on the consultation.")
                .with_tools(READ_AND_SAVE)
                .with_contract(ArtifactContract::new(
                    &[ArtifactCategory::Transcript],
                    Some(ArtifactCategory::CriticReview),
                )),
        )
    }

    /// Writes the patient-facing summary.
    #[must_use]
    pub fn summariser(&self) -> InstructionWorker {
        self.worker(
            WorkerSpec::new(SUMMARISER, prompts::SUMMARISER)
                .with_description("Summarises the consultation for the patient.")
                .with_tools(READ_AND_SAVE)
                .with_contract(ArtifactContract::new(
                    &[ArtifactCategory::Transcript],
                    Some(ArtifactCategory::MedicalSummary),
                )),
        )
    }

    /// Answers questions from the stored artifacts. Read-only.
    #[must_use]
    pub fn follow_up(&self) -> InstructionWorker {
        self.worker(
            WorkerSpec::new(FOLLOW_UP, prompts::FOLLOW_UP)
                .with_description("Answers follow-up questions from the stored artifacts.")
                .with_tools(READ_ONLY),
        )
    }
}
