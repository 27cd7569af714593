//! Tool layer: the four artifact operations and their callable wrappers.
//!
//! [`ToolLayer`] implements the operations with typed inputs and
//! [`ArtifactError`](crate::errors::ArtifactError) failures. The builtin
//! [`Tool`]s wrap them as named functions with JSON arguments and JSON
//! results, registered in a [`ToolRegistry`] that model-backed stages call
//! through.

mod audio;
mod builtin;
mod definitions;
mod layer;
mod registry;

pub use audio::{import_audio, AudioFormat, AudioSource};
pub use builtin::{
    register_builtin_tools, GetAudioFileTool, ReadProcessingFileTool, SaveProcessingFileTool,
    TranscribeAudioFileTool, GET_AUDIO_FILE, READ_PROCESSING_FILE, SAVE_PROCESSING_FILE,
    TRANSCRIBE_AUDIO_FILE,
};
pub use definitions::{
    AudioPayload, ReadPayload, SavePayload, ToolDefinition, ToolResult, TranscriptPayload,
};
pub use layer::ToolLayer;
pub use registry::{ResolvedToolCall, Tool, ToolRegistry, UnresolvedToolCall};
