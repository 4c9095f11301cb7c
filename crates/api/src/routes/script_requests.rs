//! Route definitions for the `/script-requests` resource.
//!
//! All endpoints require authentication and ownership of the request.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{outlines, script_requests};
use crate::state::AppState;

/// Routes mounted at `/script-requests`.
///
/// ```text
/// POST   /                        -> create_script_request
/// GET    /{id}                    -> get_script_request
/// GET    /{id}/sources            -> list_sources
/// POST   /{id}/sources            -> add_source
/// GET    /{id}/research-score     -> research_score
/// GET    /{id}/outline            -> latest_outline
/// POST   /{id}/outline            -> generate_outline
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(script_requests::create_script_request))
        .route("/{id}", get(script_requests::get_script_request))
        .route(
            "/{id}/sources",
            get(script_requests::list_sources).post(script_requests::add_source),
        )
        .route("/{id}/research-score", get(script_requests::research_score))
        .route(
            "/{id}/outline",
            get(outlines::latest_outline).post(outlines::generate_outline),
        )
}
