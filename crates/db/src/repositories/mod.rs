//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod job_repo;
pub mod outline_repo;
pub mod research_source_repo;
pub mod script_request_repo;

pub use job_repo::JobRepo;
pub use outline_repo::OutlineRepo;
pub use research_source_repo::ResearchSourceRepo;
pub use script_request_repo::ScriptRequestRepo;
