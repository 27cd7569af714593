//! # Medscribe
//!
//! An agent pipeline that turns a recorded doctor-patient call into clinical
//! documents.
//!
//! A run has two phases:
//!
//! - **Intake**: locate the recording in the upload folder and transcribe it
//!   into the session's `Transcript` artifact
//! - **Fan-out**: four concurrent branches read the transcript and each
//!   write one artifact (template then validation, assessment and plan,
//!   critique, patient summary)
//!
//! Model-backed stages are instances of one generic
//! [`InstructionWorker`](stages::InstructionWorker) that may only call the
//! tools it was granted. Ordering between stages is enforced by the
//! composers in [`pipeline`], not by instruction text.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use medscribe::prelude::*;
//!
//! let config = MedscribeConfig::load(None)?;
//! let coordinator = Coordinator::from_config(&config)?;
//! let mut session = ConsultationSession::new();
//!
//! let reply = coordinator.handle_turn(&mut session, "Please process CAR0002.mp3").await;
//! let answer = coordinator.handle_turn(&mut session, "What was the plan?").await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod coordinator;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod stages;
pub mod store;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::MedscribeConfig;
    pub use crate::context::{RunIdentity, StageContext};
    pub use crate::coordinator::{ConsultationSession, Coordinator, SessionPhase};
    pub use crate::core::{
        Artifact, ArtifactCategory, ArtifactRecord, SessionKey, StageOutput, StageStatus,
    };
    pub use crate::errors::{ArtifactError, ErrorKind, MedscribeError, ModelError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        ConsultationPipeline, FanOutReport, ParallelComposer, PipelineReport, SequentialComposer,
    };
    pub use crate::providers::{GeminiClient, ModelClient, RetryConfig, RetryingModelClient};
    pub use crate::stages::{InstructionWorker, Stage, StageCatalog, WorkerSpec};
    pub use crate::store::ArtifactStore;
    pub use crate::tools::{ToolLayer, ToolRegistry};
}
