//! Per-branch status reporting for composed runs.

use crate::core::{ArtifactRecord, SessionKey, StageOutput, StageStatus};
use crate::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Terminal record of one stage or branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchReport {
    /// Branch name.
    pub name: String,
    /// Terminal status.
    pub status: StageStatus,
    /// Final text, if the branch produced any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Error message for failed branches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error kind for failures caused by a tagged error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// The artifact the branch committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRecord>,
    /// Wall time in milliseconds.
    pub duration_ms: f64,
}

impl BranchReport {
    /// Builds a report from a stage output.
    #[must_use]
    pub fn from_output(name: impl Into<String>, output: StageOutput, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            status: output.status,
            text: output.text,
            error: output.error,
            error_kind: output.error_kind,
            artifact: output.artifact,
            duration_ms,
        }
    }

    /// Builds a failed report for a branch whose task never returned an output.
    #[must_use]
    pub fn aborted(name: impl Into<String>, reason: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Fail,
            text: None,
            error: Some(reason.into()),
            error_kind: None,
            artifact: None,
            duration_ms,
        }
    }

    /// Returns true if the branch succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("name".to_string(), serde_json::json!(self.name));
        map.insert("status".to_string(), serde_json::json!(self.status.to_string()));
        map.insert("duration_ms".to_string(), serde_json::json!(self.duration_ms));
        if let Some(ref error) = self.error {
            map.insert("error".to_string(), serde_json::json!(error));
        }
        if let Some(kind) = self.error_kind {
            map.insert("error_kind".to_string(), serde_json::json!(kind.as_str()));
        }
        if let Some(ref record) = self.artifact {
            map.insert("artifact".to_string(), serde_json::json!(record.display_path()));
        }
        map
    }
}

/// Outcome of a fan-out: one report per branch, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanOutReport {
    /// Branch reports.
    pub branches: Vec<BranchReport>,
    /// Wall time of the whole fan-out in milliseconds.
    pub duration_ms: f64,
}

impl FanOutReport {
    /// Returns true if every branch succeeded.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.branches.iter().all(BranchReport::is_success)
    }

    /// Returns the number of successful branches.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.branches.iter().filter(|b| b.is_success()).count()
    }

    /// Returns the number of failed or timed out branches.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.branches.len() - self.succeeded()
    }

    /// Looks up a branch by name.
    #[must_use]
    pub fn branch(&self, name: &str) -> Option<&BranchReport> {
        self.branches.iter().find(|b| b.name == name)
    }

    /// Iterates over the branches that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &BranchReport> {
        self.branches.iter().filter(|b| !b.is_success())
    }

    /// Returns the artifacts committed by successful branches.
    #[must_use]
    pub fn artifacts(&self) -> Vec<&ArtifactRecord> {
        self.branches.iter().filter_map(|b| b.artifact.as_ref()).collect()
    }

    /// One-line summary such as `3/4 branches succeeded (critic: fail)`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}/{} branches succeeded",
            self.succeeded(),
            self.branches.len()
        );
        let failed: Vec<String> = self
            .failures()
            .map(|b| format!("{}: {}", b.name, b.status))
            .collect();
        if !failed.is_empty() {
            line.push_str(&format!(" ({})", failed.join(", ")));
        }
        line
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("total_branches".to_string(), serde_json::json!(self.branches.len()));
        map.insert("succeeded".to_string(), serde_json::json!(self.succeeded()));
        map.insert("failed".to_string(), serde_json::json!(self.failed()));
        map.insert("all_ok".to_string(), serde_json::json!(self.all_ok()));
        map.insert("duration_ms".to_string(), serde_json::json!(self.duration_ms));
        map.insert(
            "branches".to_string(),
            serde_json::json!(self.branches.iter().map(BranchReport::to_dict).collect::<Vec<_>>()),
        );
        map
    }
}

/// Outcome of a whole consultation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// The session the run produced artifacts for, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<SessionKey>,
    /// The audio intake step. Absent when the run started from an existing transcript.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intake: Option<BranchReport>,
    /// The fan-out. Absent when intake failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_out: Option<FanOutReport>,
}

impl PipelineReport {
    /// Returns true if intake (when run) and every branch succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.intake.as_ref().map_or(true, BranchReport::is_success)
            && self.fan_out.as_ref().is_some_and(FanOutReport::all_ok)
    }

    /// Returns true if at least one artifact beyond the transcript was produced.
    #[must_use]
    pub fn has_results(&self) -> bool {
        self.fan_out.as_ref().is_some_and(|f| f.succeeded() > 0)
    }

    /// Returns the intake failure, if intake ran and failed.
    #[must_use]
    pub fn intake_failure(&self) -> Option<&BranchReport> {
        self.intake.as_ref().filter(|r| !r.is_success())
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("complete".to_string(), serde_json::json!(self.is_complete()));
        if let Some(ref key) = self.session_key {
            map.insert("session_key".to_string(), serde_json::json!(key.as_str()));
        }
        if let Some(ref intake) = self.intake {
            map.insert("intake".to_string(), serde_json::json!(intake.to_dict()));
        }
        if let Some(ref fan_out) = self.fan_out {
            map.insert("fan_out".to_string(), serde_json::json!(fan_out.to_dict()));
        }
        map
    }
}
