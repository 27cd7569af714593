//! Conversational control layer.
//!
//! The coordinator owns no processing logic. Per user turn it either asks
//! for a filename, runs the consultation pipeline, or hands a follow-up
//! question to the read-only follow-up worker. All failures are returned as
//! plain-language replies.

mod messages;
mod session;

pub use messages::{describe_branch, explain, extract_filename, render_report, ASK_FOR_FILENAME};
pub use session::{ConsultationSession, SessionPhase};

use crate::config::MedscribeConfig;
use crate::context::{RunIdentity, StageContext};
use crate::errors::MedscribeError;
use crate::events::{EventSink, LoggingEventSink};
use crate::pipeline::{run_stage, ConsultationPipeline, PipelineReport};
use crate::providers::{GeminiClient, ModelClient, RetryingModelClient};
use crate::stages::{InstructionWorker, StageCatalog};
use crate::store::ArtifactStore;
use crate::tools::{register_builtin_tools, ToolLayer, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives one conversation through the consultation workflow.
pub struct Coordinator {
    pipeline: ConsultationPipeline,
    follow_up: InstructionWorker,
    catalog: StageCatalog,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("pipeline", &self.pipeline)
            .field("follow_up", &self.follow_up)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a coordinator over an existing catalog.
    #[must_use]
    pub fn new(catalog: StageCatalog, pipeline: ConsultationPipeline) -> Self {
        Self {
            follow_up: catalog.follow_up(),
            pipeline,
            catalog,
            event_sink: Arc::new(LoggingEventSink::debug()),
        }
    }

    /// Wires the Gemini client, the tools and every stage from configuration.
    ///
    /// Agent calls are retried per `config.retry`. Transcription is not, so
    /// one recording costs at most one transcription call.
    ///
    /// # Errors
    ///
    /// Returns an error if the model client cannot be built, typically
    /// because no API key is configured.
    pub fn from_config(config: &MedscribeConfig) -> Result<Self, MedscribeError> {
        let client = GeminiClient::new(
            config.model.endpoint.clone(),
            config.model.api_key.clone().unwrap_or_default(),
            config.model.agent_model.clone(),
            config.model.request_timeout(),
        )?;
        Ok(Self::from_model_with_retry(config, Arc::new(client)))
    }

    /// Wires every stage over `model`, retrying agent calls but not
    /// transcription.
    #[must_use]
    pub fn from_model_with_retry(config: &MedscribeConfig, model: Arc<dyn ModelClient>) -> Self {
        let agents: Arc<dyn ModelClient> =
            Arc::new(RetryingModelClient::new(model.clone(), config.retry.clone()));
        Self::from_clients(config, model, agents)
    }

    /// Wires every stage over `model` using the storage and orchestration
    /// settings of `config`.
    #[must_use]
    pub fn from_model(config: &MedscribeConfig, model: Arc<dyn ModelClient>) -> Self {
        Self::from_clients(config, model.clone(), model)
    }

    /// Wires the tool layer over `transcription` and the agents over `agents`.
    #[must_use]
    pub fn from_clients(
        config: &MedscribeConfig,
        transcription: Arc<dyn ModelClient>,
        agents: Arc<dyn ModelClient>,
    ) -> Self {
        let store = ArtifactStore::new(config.storage.processing_dir.clone());
        let layer = ToolLayer::new(config.storage.upload_dir.clone(), store, transcription)
            .with_transcription_model(config.model.transcription_model.clone());
        let registry = Arc::new(ToolRegistry::new());
        register_builtin_tools(&registry, &layer);

        let catalog = StageCatalog::new(layer, agents, registry)
            .with_agent_model(config.model.agent_model.clone())
            .with_max_tool_turns(config.model.max_tool_turns);
        let pipeline =
            ConsultationPipeline::from_catalog(&catalog, config.orchestration.branch_timeout());
        Self::new(catalog, pipeline)
    }

    /// Routes lifecycle events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the stage catalog.
    #[must_use]
    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    fn context(&self, session: &ConsultationSession) -> StageContext {
        StageContext::new(
            RunIdentity::new().with_conversation_id(session.id),
            self.event_sink.clone(),
        )
    }

    /// Handles one user message and returns the reply.
    ///
    /// A message naming a new recording starts processing it, even when
    /// another recording was processed earlier. A message naming the
    /// recording already processed is a follow-up question, as is anything
    /// else once a transcript exists. Otherwise the reply asks for a
    /// filename.
    pub async fn handle_turn(&self, session: &mut ConsultationSession, message: &str) -> String {
        session.turns += 1;
        if let Some(filename) = extract_filename(message) {
            let already_processed = matches!(session.phase, SessionPhase::Ready)
                && session.filename.as_deref() == Some(filename.as_str());
            if !already_processed {
                return self.process(session, &filename).await;
            }
            debug!(conversation = %session.id, filename = %filename, "Recording already processed");
        }
        match session.phase {
            SessionPhase::Ready => self.answer(session, message).await,
            SessionPhase::AwaitingFilename | SessionPhase::Failed | SessionPhase::Processing => {
                ASK_FOR_FILENAME.to_string()
            }
        }
    }

    /// Runs the pipeline for `filename` and records the outcome on `session`.
    pub async fn process(&self, session: &mut ConsultationSession, filename: &str) -> String {
        session.reset();
        session.filename = Some(filename.to_string());
        session.phase = SessionPhase::Processing;
        info!(conversation = %session.id, filename, "Processing recording");

        let ctx = self.context(session).with_filename(filename);
        let report = self.pipeline.run(&ctx).await;
        let reply = render_report(filename, &report);
        Self::record(session, report);
        reply
    }

    fn record(session: &mut ConsultationSession, report: PipelineReport) {
        session.session_key = report.session_key.clone();
        session.phase = if report.session_key.is_some() {
            SessionPhase::Ready
        } else {
            SessionPhase::Failed
        };
        if !report.is_complete() {
            warn!(conversation = %session.id, phase = %session.phase, "Run finished with failures");
        }
        session.last_report = Some(report);
    }

    /// Answers a question from the stored artifacts of the session.
    pub async fn answer(&self, session: &ConsultationSession, question: &str) -> String {
        let Some(ref key) = session.session_key else {
            return ASK_FOR_FILENAME.to_string();
        };
        let ctx = self
            .context(session)
            .with_session_key(key.clone())
            .with_prompt(question);
        let (output, _) = run_stage(&self.follow_up, &ctx).await;
        if output.is_success() {
            output.text.unwrap_or_default()
        } else {
            explain(output.error_kind, output.error_message())
        }
    }
}
