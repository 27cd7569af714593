//! Stand-in stages for composer tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::context::StageContext;
use crate::core::StageOutput;
use crate::stages::Stage;

/// Log shared between several [`RecordingStage`]s, in execution order.
pub type SharedLog = Arc<Mutex<Vec<String>>>;

/// A stage that returns a fixed output.
#[derive(Debug, Clone)]
pub struct StaticStage {
    name: String,
    output: StageOutput,
}

impl StaticStage {
    /// Succeeds with `text`.
    #[must_use]
    pub fn ok(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: StageOutput::ok_text(text),
        }
    }

    /// Fails with `error`.
    #[must_use]
    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: StageOutput::fail(error),
        }
    }

    /// Returns `output` verbatim.
    #[must_use]
    pub fn returning(name: impl Into<String>, output: StageOutput) -> Self {
        Self {
            name: name.into(),
            output,
        }
    }

    /// Adds a data entry to the fixed output.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.output = self.output.add_data(key, value);
        self
    }
}

#[async_trait]
impl Stage for StaticStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        self.output.clone()
    }
}

/// A stage that writes `name:start` and `name:end` to a shared log,
/// optionally sleeping in between.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    log: SharedLog,
    delay: Option<Duration>,
    sessions: Mutex<Vec<Option<String>>>,
}

impl RecordingStage {
    /// Creates an empty shared log.
    #[must_use]
    pub fn shared_log() -> SharedLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Creates a stage writing to `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: SharedLog) -> Self {
        Self {
            name: name.into(),
            log,
            delay: None,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps for `delay` between the start and end entries.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of executions that started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns the session key seen by each execution.
    #[must_use]
    pub fn sessions(&self) -> Vec<Option<String>> {
        self.sessions.lock().clone()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        self.sessions
            .lock()
            .push(ctx.session_key().map(ToString::to_string));
        self.log.lock().push(format!("{}:start", self.name));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.lock().push(format!("{}:end", self.name));
        StageOutput::ok_text(format!("{} done", self.name))
    }
}

/// A stage whose task panics. Used to check that a join survives it.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
}

impl PanickingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::panic)]
    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        panic!("{} panicked", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_stage_logs() {
        let log = RecordingStage::shared_log();
        let stage = RecordingStage::new("critic", log.clone());
        let output = stage.execute(&StageContext::detached()).await;

        assert!(output.is_success());
        assert_eq!(*log.lock(), vec!["critic:start", "critic:end"]);
        assert_eq!(stage.sessions(), vec![None]);
    }

    #[tokio::test]
    async fn test_static_stage_data() {
        let stage = StaticStage::ok("a", "x").with_data("k", serde_json::json!(1));
        let output = stage.execute(&StageContext::detached()).await;
        assert_eq!(output.get("k"), Some(&serde_json::json!(1)));
    }
}
