//! Per-run context handed to every stage.

mod identity;
mod stage;

pub use identity::RunIdentity;
pub use stage::StageContext;
