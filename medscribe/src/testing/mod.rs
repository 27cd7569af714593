//! Testing utilities for medscribe pipelines.
//!
//! This module provides:
//! - Stand-in stages for composer tests
//! - A scripted model client that needs no network
//! - Wired workspaces and a scripted consultation
//! - Assertions for stage outputs and tool responses

mod assertions;
mod fixtures;
mod mocks;
mod model;

pub use assertions::{
    assert_output_failed, assert_output_kind, assert_output_status, assert_output_succeeded,
    assert_tool_failed, assert_tool_succeeded,
};
pub use fixtures::{script, scripted_consultation, TestWorkspace};
pub use mocks::{PanickingStage, RecordingStage, SharedLog, StaticStage};
pub use model::{model_turns, Responder, ScriptedModel};
