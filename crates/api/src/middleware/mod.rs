//! Request extractors.
//!
//! - [`auth::AuthUser`]: the authenticated principal from a JWT Bearer token.

pub mod auth;
