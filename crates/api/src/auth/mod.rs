//! Authentication primitives.
//!
//! - [`jwt`]: access-token generation and validation.
//! - [`secret`]: shared-secret comparison for the internal trigger.

pub mod jwt;
pub mod secret;
