//! Client for the external text-generation service.
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol and implements
//! [`longform_core::generation::GenerationService`]. Every call passes
//! through a shared [`longform_core::rate_limit::RateLimiter`] and carries
//! its own timeout.

pub mod client;
pub mod config;
mod wire;

pub use client::ChatCompletionsClient;
pub use config::GenerationConfig;
