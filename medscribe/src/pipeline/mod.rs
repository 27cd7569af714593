//! Composition of stages into a consultation run.
//!
//! - [`SequentialComposer`]: ordered steps, each gated on the previous one's success
//! - [`ParallelComposer`]: independent branches joined best-effort
//! - [`ConsultationPipeline`]: intake, then the fan-out over the transcript

mod consultation;
mod parallel;
mod report;
mod sequential;

pub use consultation::ConsultationPipeline;
pub use parallel::ParallelComposer;
pub use report::{BranchReport, FanOutReport, PipelineReport};
pub use sequential::{SequenceState, SequentialComposer};

use crate::context::StageContext;
use crate::core::StageOutput;
use crate::events::names;
use crate::observability::StageTimer;
use crate::stages::Stage;
use serde_json::json;

/// Runs one stage under a child context, bracketing it with lifecycle events.
///
/// Returns the output and the wall time in milliseconds.
pub(crate) async fn run_stage(stage: &dyn Stage, parent: &StageContext) -> (StageOutput, f64) {
    let ctx = parent.child(stage.name());
    ctx.emit(names::STAGE_STARTED, json!({})).await;

    let timer = StageTimer::start(stage.name());
    let output = stage.execute(&ctx).await;
    let duration_ms = timer.finish();

    if output.is_success() {
        ctx.emit(names::STAGE_COMPLETED, json!({ "duration_ms": duration_ms }))
            .await;
    } else {
        ctx.emit(
            names::STAGE_FAILED,
            json!({
                "status": output.status.to_string(),
                "error": output.error,
                "error_kind": output.error_kind.map(|k| k.as_str()),
                "duration_ms": duration_ms,
            }),
        )
        .await;
    }
    (output, duration_ms)
}
