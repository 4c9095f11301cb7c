//! Route definitions for outline review.

use axum::routing::{post, put};
use axum::Router;

use crate::handlers::outlines;
use crate::state::AppState;

/// Routes mounted at `/outlines`.
///
/// ```text
/// POST   /review          -> review_outline
/// PUT    /regenerate      -> regenerate_outline
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/review", post(outlines::review_outline))
        .route("/regenerate", put(outlines::regenerate_outline))
}
