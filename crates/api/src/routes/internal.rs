//! Machine-to-machine endpoints. Authenticated by shared secret, not JWT.

use axum::routing::post;
use axum::Router;

use crate::handlers::trigger;
use crate::state::AppState;

/// Routes mounted at `/internal`.
///
/// ```text
/// POST   /trigger         -> trigger_scheduler
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/trigger", post(trigger::trigger_scheduler))
}
