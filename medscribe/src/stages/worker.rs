//! Generic instruction-bound worker.

use super::Stage;
use crate::context::StageContext;
use crate::core::{ArtifactCategory, ArtifactRecord, SessionKey, StageOutput};
use crate::errors::ArtifactError;
use crate::events::names;
use crate::prompts;
use crate::providers::{Content, ModelClient, ModelRequest};
use crate::store::ArtifactStore;
use crate::tools::{ResolvedToolCall, SavePayload, ToolRegistry, ToolResult, SAVE_PROCESSING_FILE};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Which artifacts a worker consumes and produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactContract {
    /// Artifacts that must exist before the worker runs.
    pub reads: Vec<ArtifactCategory>,
    /// The artifact the worker is responsible for, if any.
    pub writes: Option<ArtifactCategory>,
}

impl ArtifactContract {
    /// Creates a contract.
    #[must_use]
    pub fn new(reads: &[ArtifactCategory], writes: Option<ArtifactCategory>) -> Self {
        Self {
            reads: reads.to_vec(),
            writes,
        }
    }
}

/// Static configuration of one agent.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Stage name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// System instruction.
    pub instruction: String,
    /// Names of the tools the worker may call.
    pub tools: Vec<&'static str>,
    /// Artifact contract.
    pub contract: ArtifactContract,
}

impl WorkerSpec {
    /// Creates a spec with no tools and an empty contract.
    #[must_use]
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: instruction.into(),
            tools: Vec::new(),
            contract: ArtifactContract::default(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the allowed tools.
    #[must_use]
    pub fn with_tools(mut self, tools: &[&'static str]) -> Self {
        self.tools = tools.to_vec();
        self
    }

    /// Sets the artifact contract.
    #[must_use]
    pub fn with_contract(mut self, contract: ArtifactContract) -> Self {
        self.contract = contract;
        self
    }
}

/// A model-backed stage bound to one instruction and a tool allow-list.
///
/// The worker runs a bounded tool-call loop. When its contract names an
/// artifact to write and the model finished without saving it, the worker
/// saves the model's final text itself, so the contract holds whatever the
/// model decided.
pub struct InstructionWorker {
    spec: WorkerSpec,
    model: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    store: ArtifactStore,
    agent_model: Option<String>,
    max_tool_turns: usize,
}

impl std::fmt::Debug for InstructionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionWorker")
            .field("spec", &self.spec)
            .field("agent_model", &self.agent_model)
            .field("max_tool_turns", &self.max_tool_turns)
            .finish_non_exhaustive()
    }
}

/// What the tool loop ended with.
struct LoopOutcome {
    text: String,
    turns: usize,
    saved_by_model: bool,
}

impl InstructionWorker {
    /// Default bound on model round-trips per execution.
    pub const DEFAULT_MAX_TOOL_TURNS: usize = 8;

    /// Creates a worker.
    #[must_use]
    pub fn new(
        spec: WorkerSpec,
        model: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            spec,
            model,
            registry,
            store,
            agent_model: None,
            max_tool_turns: Self::DEFAULT_MAX_TOOL_TURNS,
        }
    }

    /// Uses a specific model instead of the client default.
    #[must_use]
    pub fn with_agent_model(mut self, model: impl Into<String>) -> Self {
        self.agent_model = Some(model.into());
        self
    }

    /// Sets the bound on model round-trips.
    #[must_use]
    pub fn with_max_tool_turns(mut self, turns: usize) -> Self {
        self.max_tool_turns = turns.max(1);
        self
    }

    /// Returns the worker's spec.
    #[must_use]
    pub fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    async fn check_inputs(&self, session: &SessionKey) -> Result<(), ArtifactError> {
        for category in &self.spec.contract.reads {
            if !self.store.exists(session, *category).await {
                // Surface the precise store error (missing namespace or file).
                self.store.read(session, *category).await?;
            }
        }
        Ok(())
    }

    fn initial_request(&self, ctx: &StageContext, session: &SessionKey) -> ModelRequest {
        let instruction = format!(
            "{}\n\n{}",
            self.spec.instruction,
            prompts::session_preamble(session.as_str())
        );
        let opening = ctx.prompt().map_or_else(
            || format!("Process the consultation `{session}` now."),
            str::to_string,
        );
        let mut request = ModelRequest::new()
            .with_system_instruction(instruction)
            .with_content(Content::user_text(opening))
            .with_tools(self.registry.definitions(&self.spec.tools));
        if let Some(ref model) = self.agent_model {
            request = request.with_model(model.clone());
        }
        request
    }

    /// Checks that a save targets this worker's own artifact in the current
    /// session. Other tools pass through.
    fn check_save(&self, call: &ResolvedToolCall, session: &SessionKey) -> Result<(), ArtifactError> {
        if call.name != SAVE_PROCESSING_FILE {
            return Ok(());
        }
        let category = call
            .arguments
            .get("file_category")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match self.spec.contract.writes {
            Some(writes) if category == writes.as_str() => {}
            Some(writes) => return Err(ArtifactError::invalid_category(category, &[writes.as_str()])),
            None => return Err(ArtifactError::invalid_category(category, &[])),
        }
        let key = call
            .arguments
            .get("audio_filename")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if key.is_empty() {
            return Err(ArtifactError::EmptySessionKey);
        }
        if key != session.as_str() {
            return Err(ArtifactError::invalid_session_key(
                key,
                format!("stage '{}' may only write to session '{session}'", self.spec.name),
            ));
        }
        Ok(())
    }

    async fn run_tool_loop(
        &self,
        ctx: &StageContext,
        session: &SessionKey,
    ) -> Result<LoopOutcome, String> {
        let mut request = self.initial_request(ctx, session);
        let mut saved_by_model = false;

        for turn in 1..=self.max_tool_turns {
            let response = self
                .model
                .generate(request.clone())
                .await
                .map_err(|e| ArtifactError::from(e).to_string())?;

            if !response.has_function_calls() {
                return Ok(LoopOutcome {
                    text: response.text,
                    turns: turn,
                    saved_by_model,
                });
            }

            request.contents.push(response.to_content());
            let mut results = Vec::with_capacity(response.function_calls.len());
            for result in self
                .registry
                .parse_and_resolve(&response.function_calls, &self.spec.tools)
            {
                match result {
                    Ok(call) => {
                        ctx.emit(names::TOOL_INVOKED, json!({ "tool": call.name, "turn": turn }))
                            .await;
                        let reply = match self.check_save(&call, session) {
                            Ok(()) => {
                                let reply = self.registry.call(&call).await;
                                saved_by_model |= call.name == SAVE_PROCESSING_FILE
                                    && reply.get("success").and_then(Value::as_bool) == Some(true);
                                reply
                            }
                            Err(e) => {
                                warn!(stage = %self.spec.name, error = %e, "Save outside the artifact contract");
                                ToolResult::<SavePayload>::fail(&e).to_value()
                            }
                        };
                        results.push((call.name, reply));
                    }
                    Err(rejected) => {
                        warn!(stage = %self.spec.name, tool = %rejected.name, error = %rejected.error, "Rejected tool call");
                        results.push((rejected.name.clone(), rejected.to_response()));
                    }
                }
            }
            request.contents.push(Content::tool_responses(results));
        }

        Err(format!(
            "Stage '{}' did not finish within {} model turns",
            self.spec.name, self.max_tool_turns
        ))
    }

    async fn commit(
        &self,
        session: &SessionKey,
        category: ArtifactCategory,
        outcome: &LoopOutcome,
    ) -> Result<ArtifactRecord, ArtifactError> {
        if outcome.saved_by_model {
            let artifact = self.store.read(session, category).await?;
            return Ok(ArtifactRecord::new(
                session.clone(),
                category,
                artifact.location,
                artifact.content.len(),
            ));
        }
        debug!(stage = %self.spec.name, category = %category, "Model did not save; saving final text");
        self.store.write(session, category, &outcome.text).await
    }
}

#[async_trait]
impl Stage for InstructionWorker {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let Some(session) = ctx.session_key().cloned() else {
            return StageOutput::from_error(&ArtifactError::EmptySessionKey);
        };
        if let Err(e) = self.check_inputs(&session).await {
            return StageOutput::from_error(&e);
        }

        let outcome = match self.run_tool_loop(ctx, &session).await {
            Ok(outcome) => outcome,
            Err(reason) => return StageOutput::fail(reason),
        };

        let output = match self.spec.contract.writes {
            Some(category) => {
                if !outcome.saved_by_model && outcome.text.trim().is_empty() {
                    return StageOutput::fail(format!(
                        "Stage '{}' produced no {category}",
                        self.spec.name
                    ));
                }
                match self.commit(&session, category, &outcome).await {
                    Ok(record) => StageOutput::ok_text(outcome.text.clone()).with_artifact(record),
                    Err(e) => return StageOutput::from_error(&e),
                }
            }
            None => {
                if outcome.text.trim().is_empty() {
                    return StageOutput::fail(format!("Stage '{}' returned no text", self.spec.name));
                }
                StageOutput::ok_text(outcome.text.clone())
            }
        };

        output
            .add_data("model_turns", json!(outcome.turns))
            .add_data("saved_by_model", json!(outcome.saved_by_model))
    }
}
