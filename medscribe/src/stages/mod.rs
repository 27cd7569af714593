//! Stage trait and the stages that make up a consultation run.
//!
//! Every agent is an [`InstructionWorker`] configured by a [`WorkerSpec`];
//! there is no subtype per agent. Audio intake is the one deterministic
//! stage: it never asks the model whether to transcribe.

mod catalog;
mod intake;
mod worker;

pub use catalog::{
    StageCatalog, ASSESSMENT_PLANNER, CRITIC, FOLLOW_UP, MEDICAL_TEMPLATE, SUMMARISER,
    TEMPLATE_VALIDATOR,
};
pub use intake::AudioIntake;
pub use worker::{ArtifactContract, InstructionWorker, WorkerSpec};

use crate::context::StageContext;
use crate::core::StageOutput;
use async_trait::async_trait;
use std::fmt::Debug;

/// A unit of work in a consultation run.
///
/// Stages report failures through the returned [`StageOutput`] instead of
/// panicking or returning `Err`, so composers can always collect a status.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    async fn execute(&self, ctx: &StageContext) -> StageOutput;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticStage;

    #[tokio::test]
    async fn test_stage_object_safety() {
        let stage: Box<dyn Stage> = Box::new(StaticStage::ok("noop", "done"));
        assert_eq!(stage.name(), "noop");

        let output = stage.execute(&StageContext::detached()).await;
        assert!(output.is_success());
        assert_eq!(output.text.as_deref(), Some("done"));
    }
}
