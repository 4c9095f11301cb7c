//! Job scheduler for the long-form pipeline.
//!
//! [`Scheduler::run_once`] claims at most one pending job and drives it to
//! a terminal state or back into the queue within a bounded budget. It is
//! safe to call from several places at once (periodic loop, immediate
//! trigger after enqueue, the internal trigger endpoint) because claims are
//! atomic.

pub mod config;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use scheduler::{RunOutcome, Scheduler};
