//! Best-effort fan-out with a join over every branch.

use super::{run_stage, BranchReport, FanOutReport, SequentialComposer};
use crate::context::StageContext;
use crate::core::{StageOutput, StageStatus};
use crate::events::names;
use crate::observability::StageTimer;
use crate::stages::{Stage, StageCatalog};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Launches every branch at once and waits for all of them.
///
/// A failing, panicking or timed out branch never cancels its siblings; the
/// join returns only once each branch has a terminal status.
#[derive(Debug, Clone)]
pub struct ParallelComposer {
    name: String,
    branches: Vec<Arc<dyn Stage>>,
    branch_timeout: Option<Duration>,
}

impl ParallelComposer {
    /// Name of the consultation fan-out.
    pub const CONSULTATION_FAN_OUT: &'static str = "consultation_fan_out";

    /// Creates a composer over `branches`.
    #[must_use]
    pub fn new(name: impl Into<String>, branches: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            name: name.into(),
            branches,
            branch_timeout: None,
        }
    }

    /// The four consultation branches: the template sequence, the
    /// assessment planner, the critic and the summariser.
    #[must_use]
    pub fn consultation(catalog: &StageCatalog) -> Self {
        Self::new(
            Self::CONSULTATION_FAN_OUT,
            vec![
                Arc::new(SequentialComposer::template_then_validation(catalog)),
                Arc::new(catalog.assessment_planner()),
                Arc::new(catalog.critic()),
                Arc::new(catalog.summariser()),
            ],
        )
    }

    /// Bounds each branch's wall time. An overrunning branch reports `TimedOut`.
    #[must_use]
    pub fn with_branch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.branch_timeout = timeout;
        self
    }

    /// Returns the branch names in declaration order.
    #[must_use]
    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name()).collect()
    }

    fn spawn_branch(
        &self,
        index: usize,
        branch: Arc<dyn Stage>,
        ctx: StageContext,
    ) -> tokio::task::JoinHandle<BranchReport> {
        let timeout = self.branch_timeout;
        tokio::spawn(async move {
            let name = branch.name().to_string();
            let Some(limit) = timeout else {
                let (output, duration_ms) = run_stage(branch.as_ref(), &ctx).await;
                return BranchReport::from_output(name, output, duration_ms);
            };

            let timer = StageTimer::start(name.as_str());
            match tokio::time::timeout(limit, run_stage(branch.as_ref(), &ctx)).await {
                Ok((output, duration_ms)) => BranchReport::from_output(name, output, duration_ms),
                Err(_) => {
                    let duration_ms = timer.finish();
                    warn!(branch = %name, index, timeout_secs = limit.as_secs_f64(), "Branch timed out");
                    ctx.child(name.as_str())
                        .emit(
                            names::STAGE_FAILED,
                            json!({
                                "status": StageStatus::TimedOut.to_string(),
                                "duration_ms": duration_ms,
                            }),
                        )
                        .await;
                    BranchReport::from_output(
                        name,
                        StageOutput::timed_out(limit.as_secs_f64()),
                        duration_ms,
                    )
                }
            }
        })
    }

    /// Runs every branch and joins them all.
    pub async fn run(&self, ctx: &StageContext) -> FanOutReport {
        let ctx = ctx.child(self.name.as_str());
        ctx.emit(
            names::FANOUT_STARTED,
            json!({ "branches": self.branch_names() }),
        )
        .await;
        info!(fan_out = %self.name, branches = self.branches.len(), "Launching branches");

        let timer = StageTimer::start(self.name.as_str());
        let mut running = FuturesUnordered::new();
        for (index, branch) in self.branches.iter().enumerate() {
            let handle = self.spawn_branch(index, branch.clone(), ctx.clone());
            running.push(handle.map(move |joined| (index, joined)));
        }

        let mut slots: Vec<Option<BranchReport>> = vec![None; self.branches.len()];
        while let Some((index, joined)) = running.next().await {
            let report = match joined {
                Ok(report) => report,
                Err(e) => {
                    let name = self.branches[index].name();
                    error!(branch = %name, error = %e, "Branch task aborted");
                    BranchReport::aborted(
                        name,
                        format!("Branch task aborted: {e}"),
                        timer.elapsed_ms(),
                    )
                }
            };
            ctx.emit(
                names::FANOUT_BRANCH_FINISHED,
                json!({
                    "branch": report.name,
                    "status": report.status.to_string(),
                    "error": report.error,
                }),
            )
            .await;
            slots[index] = Some(report);
        }

        let report = FanOutReport {
            branches: slots.into_iter().flatten().collect(),
            duration_ms: timer.finish(),
        };
        ctx.emit(
            names::FANOUT_COMPLETED,
            json!({
                "succeeded": report.succeeded(),
                "failed": report.failed(),
                "duration_ms": report.duration_ms,
            }),
        )
        .await;
        info!(fan_out = %self.name, summary = %report.summary(), "Fan-out joined");
        report
    }
}

#[async_trait]
impl Stage for ParallelComposer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let report = self.run(ctx).await;
        let output = if report.all_ok() {
            StageOutput::ok_text(report.summary())
        } else {
            StageOutput::fail(report.summary())
        };
        let dict: serde_json::Map<String, serde_json::Value> =
            report.to_dict().into_iter().collect();
        output.add_data("fan_out", serde_json::Value::Object(dict))
    }
}
