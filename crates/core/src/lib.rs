//! Domain model and pure logic for the long-form script generation pipeline.
//!
//! Everything here is free of HTTP and SQL concerns. The persistence and
//! generation boundaries are expressed as traits ([`store::JobStore`],
//! [`generation::GenerationService`]) so the scheduler and orchestrator can
//! be exercised against in-memory implementations.

pub mod chunk_plan;
pub mod error;
pub mod generation;
pub mod job;
pub mod outline;
pub mod rate_limit;
pub mod research;
pub mod retry;
pub mod status;
pub mod store;
pub mod types;
