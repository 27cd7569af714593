//! Event sink system for observability.
//!
//! Stages, composers and tools report lifecycle events through an
//! [`EventSink`] carried on the stage context. There is no process-wide sink;
//! whoever builds the context decides where events go.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by the pipeline.
pub mod names {
    /// A stage began executing.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage finished successfully.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage finished with a failure.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A sequential composer moved to a new state.
    pub const SEQUENCE_TRANSITION: &str = "sequence.transition";
    /// A sequential composer finished.
    pub const SEQUENCE_COMPLETED: &str = "sequence.completed";
    /// A sequential composer stopped on a failed step.
    pub const SEQUENCE_FAILED: &str = "sequence.failed";
    /// A parallel composer launched its branches.
    pub const FANOUT_STARTED: &str = "fanout.started";
    /// A single branch reached a terminal status.
    pub const FANOUT_BRANCH_FINISHED: &str = "fanout.branch_finished";
    /// Every branch reached a terminal status.
    pub const FANOUT_COMPLETED: &str = "fanout.completed";
    /// A tool was invoked by a worker.
    pub const TOOL_INVOKED: &str = "tool.invoked";
}
