//! Core domain model types for medscribe.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Artifact categories and session keys
//! - Stage status and the stage output type
//! - Artifact records returned by the store

mod artifact;
mod category;
mod output;
mod session;
mod status;

pub use artifact::{Artifact, ArtifactRecord};
pub use category::ArtifactCategory;
pub use output::StageOutput;
pub use session::SessionKey;
pub use status::StageStatus;
