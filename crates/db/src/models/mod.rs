//! Row structs and request DTOs.
//!
//! Each submodule contains a `FromRow` struct matching the database row,
//! the `Deserialize` DTOs accepted by the API for that entity, and the
//! conversions into `longform_core` domain types where one exists.

pub mod job;
pub mod outline;
pub mod research_source;
pub mod script_request;
pub mod status;
