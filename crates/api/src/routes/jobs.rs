//! Route definitions for the `/jobs` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /                -> enqueue_job
/// GET    /{id}            -> get_job_progress
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(jobs::enqueue_job))
        .route("/{id}", get(jobs::get_job_progress))
}
