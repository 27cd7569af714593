//! Ordered composition with completion gating.

use super::{run_stage, BranchReport};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::events::names;
use crate::stages::{Stage, StageCatalog};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Where a sequential run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SequenceState {
    /// Nothing has started.
    Idle,
    /// The named step is executing.
    Running {
        /// Step name.
        stage: String,
    },
    /// Every step succeeded.
    Done,
    /// A step failed; later steps never started.
    Failed {
        /// The failed step.
        stage: String,
        /// Its failure reason.
        reason: String,
    },
}

impl SequenceState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running { stage } => write!(f, "running({stage})"),
            Self::Done => write!(f, "done"),
            Self::Failed { stage, .. } => write!(f, "failed({stage})"),
        }
    }
}

/// Runs its steps one after another.
///
/// A step starts only once the previous step has returned a successful
/// output, which for a writing worker means its artifact is on disk. The
/// first failure ends the run.
#[derive(Debug, Clone)]
pub struct SequentialComposer {
    name: String,
    steps: Vec<Arc<dyn Stage>>,
}

impl SequentialComposer {
    /// Name of the template-then-validation sequence.
    pub const TEMPLATE_SEQUENCE: &'static str = "template_sequence";

    /// Creates a composer over `steps`, run in order.
    #[must_use]
    pub fn new(name: impl Into<String>, steps: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// The medical template followed by its validation.
    #[must_use]
    pub fn template_then_validation(catalog: &StageCatalog) -> Self {
        Self::new(
            Self::TEMPLATE_SEQUENCE,
            vec![
                Arc::new(catalog.medical_template()),
                Arc::new(catalog.template_validator()),
            ],
        )
    }

    /// Returns the step names in order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    async fn transition(&self, ctx: &StageContext, from: &SequenceState, to: SequenceState) -> SequenceState {
        ctx.emit(
            names::SEQUENCE_TRANSITION,
            json!({ "from": from.to_string(), "to": to.to_string() }),
        )
        .await;
        to
    }

    /// Runs every step, stopping at the first failure.
    ///
    /// Returns the terminal state and a report for each step that ran.
    pub async fn run(&self, ctx: &StageContext) -> (SequenceState, Vec<(BranchReport, StageOutput)>) {
        let ctx = ctx.child(self.name.as_str());
        let mut state = SequenceState::Idle;
        let mut ran = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            state = self
                .transition(&ctx, &state, SequenceState::Running { stage: step.name().to_string() })
                .await;

            let (output, duration_ms) = run_stage(step.as_ref(), &ctx).await;
            let report = BranchReport::from_output(step.name(), output.clone(), duration_ms);

            if !output.is_success() {
                let reason = output.error_message().to_string();
                warn!(sequence = %self.name, stage = %step.name(), error = %reason, "Sequence stopped");
                state = self
                    .transition(
                        &ctx,
                        &state,
                        SequenceState::Failed { stage: step.name().to_string(), reason: reason.clone() },
                    )
                    .await;
                ctx.emit(
                    names::SEQUENCE_FAILED,
                    json!({ "failed_stage": step.name(), "error": reason }),
                )
                .await;
                ran.push((report, output));
                return (state, ran);
            }
            ran.push((report, output));
        }

        state = self.transition(&ctx, &state, SequenceState::Done).await;
        ctx.emit(names::SEQUENCE_COMPLETED, json!({ "steps": self.step_names() }))
            .await;
        info!(sequence = %self.name, steps = ran.len(), "Sequence completed");
        (state, ran)
    }
}

#[async_trait]
impl Stage for SequentialComposer {
    fn name(&self) -> &str {
        &self.name
    }

    /// Folds the step outputs into one.
    ///
    /// The text is the last step's text (the review, for the template
    /// sequence) and the artifact is the last one committed by any step.
    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let (state, ran) = self.run(ctx).await;
        let steps: Vec<_> = ran.iter().map(|(report, _)| report.to_dict()).collect();
        let artifact = ran.iter().rev().find_map(|(_, output)| output.artifact.clone());

        let output = match state {
            SequenceState::Failed { ref stage, .. } => {
                let Some((_, failed)) = ran.last() else {
                    return StageOutput::fail(format!("Sequence {} failed", self.name));
                };
                let mut output = StageOutput {
                    error: Some(format!("{stage}: {}", failed.error_message())),
                    ..failed.clone()
                };
                output.text = None;
                output.data.clear();
                output.artifact = artifact;
                output.add_data("failed_stage", json!(stage))
            }
            _ => {
                let text = ran.last().and_then(|(_, output)| output.text.clone());
                let mut output = text.map_or_else(StageOutput::ok_empty, StageOutput::ok_text);
                output.artifact = artifact;
                output
            }
        };
        output
            .add_data("state", json!(state.to_string()))
            .add_data("steps", json!(steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::events::CollectingEventSink;
    use crate::context::RunIdentity;
    use crate::testing::{RecordingStage, StaticStage};

    fn sink_ctx() -> (Arc<CollectingEventSink>, StageContext) {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = StageContext::new(RunIdentity::new(), sink.clone());
        (sink, ctx)
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let log = RecordingStage::shared_log();
        let composer = SequentialComposer::new(
            "seq",
            vec![
                Arc::new(RecordingStage::new("template", log.clone())),
                Arc::new(RecordingStage::new("validation", log.clone())),
            ],
        );
        let (state, ran) = composer.run(&StageContext::detached()).await;

        assert_eq!(state, SequenceState::Done);
        assert_eq!(ran.len(), 2);
        assert_eq!(
            *log.lock(),
            vec![
                "template:start", "template:end", "validation:start", "validation:end"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_sequence() {
        let log = RecordingStage::shared_log();
        let later = Arc::new(RecordingStage::new("validation", log.clone()));
        let composer = SequentialComposer::new(
            "seq",
            vec![Arc::new(StaticStage::fail("template", "model unavailable")), later.clone()],
        );
        let (sink, ctx) = sink_ctx();

        let output = composer.execute(&ctx).await;

        assert_eq!(output.status, StageStatus::Fail);
        assert_eq!(output.error.as_deref(), Some("template: model unavailable"));
        assert_eq!(output.get("failed_stage"), Some(&json!("template")));
        assert_eq!(later.calls(), 0);
        assert!(log.lock().is_empty());
        assert_eq!(sink.events_of_type(names::SEQUENCE_FAILED).len(), 1);
        assert!(sink.events_of_type(names::SEQUENCE_COMPLETED).is_empty());
    }

    #[tokio::test]
    async fn test_transitions() {
        let composer = SequentialComposer::new(
            "seq",
            vec![
                Arc::new(StaticStage::ok("template", "saved")),
                Arc::new(StaticStage::ok("validation", "No issues found.")),
            ],
        );
        let (sink, ctx) = sink_ctx();
        let output = composer.execute(&ctx).await;

        assert!(output.is_success());
        assert_eq!(output.text.as_deref(), Some("No issues found."));
        let targets: Vec<String> = sink
            .events_of_type(names::SEQUENCE_TRANSITION)
            .into_iter()
            .filter_map(|(_, data)| data.and_then(|d| d["to"].as_str().map(str::to_string)))
            .collect();
        assert_eq!(targets, vec!["running(template)", "running(validation)", "done"]);

        let template_done = sink
            .position_of(names::STAGE_COMPLETED, "stage", "template")
            .unwrap();
        let validation_started = sink
            .position_of(names::STAGE_STARTED, "stage", "validation")
            .unwrap();
        assert!(template_done < validation_started);
    }
}
