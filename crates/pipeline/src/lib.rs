//! LLM-backed stages of the long-form pipeline.
//!
//! - [`planner::ChunkPlanner`] distributes content points across chunks.
//! - [`outline::OutlineGenerator`] drafts the outline a user approves.
//! - [`orchestrator::GenerationOrchestrator`] writes the script chunk by
//!   chunk, persisting progress after each one.
//!
//! All stages talk to the service through
//! `longform_core::generation::GenerationService`.

pub mod error;
pub mod json;
pub mod orchestrator;
pub mod outline;
pub mod planner;
pub mod prompts;

#[cfg(test)]
pub(crate) mod testing;

pub use error::OrchestrationError;
pub use orchestrator::{GenerationOrchestrator, ScriptResult};
pub use outline::{OutlineDraft, OutlineGenerator, OutlineInput};
pub use planner::{ChunkPlanner, PlanSource, PlannedContent};
