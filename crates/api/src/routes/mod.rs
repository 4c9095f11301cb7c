pub mod health;
pub mod internal;
pub mod jobs;
pub mod outlines;
pub mod script_requests;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /script-requests                                 create
/// /script-requests/{id}                            get
/// /script-requests/{id}/sources                    list, add research source
/// /script-requests/{id}/research-score             adequacy report
/// /script-requests/{id}/outline                    latest (GET), generate (POST)
///
/// /outlines/review                                 approve / reject (POST)
/// /outlines/regenerate                             send back with feedback (PUT)
///
/// /jobs                                            enqueue (POST)
/// /jobs/{id}                                       poll
///
/// /internal/trigger                                run one scheduler pass (secret header)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/script-requests", script_requests::router())
        .nest("/outlines", outlines::router())
        .nest("/jobs", jobs::router())
        .nest("/internal", internal::router())
}
