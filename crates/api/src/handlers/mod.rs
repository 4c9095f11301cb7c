pub mod jobs;
pub mod outlines;
pub mod script_requests;
pub mod trigger;

use longform_core::error::CoreError;
use longform_core::outline::ensure_owner;
use longform_core::types::DbId;
use longform_db::models::script_request::ScriptRequest;
use longform_db::repositories::ScriptRequestRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;

/// Fetch a script request and verify the caller owns it.
///
/// Returns `NotFound` if the request does not exist and `Forbidden` if the
/// caller is not its owner. Every handler that reads or changes anything
/// under a request goes through here first.
pub(crate) async fn find_owned_request(
    pool: &sqlx::PgPool,
    request_id: DbId,
    auth: &AuthUser,
) -> AppResult<ScriptRequest> {
    let request = ScriptRequestRepo::find_by_id(pool, request_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ScriptRequest",
            id: request_id,
        }))?;

    ensure_owner(request.owner_id, auth.user_id)?;
    Ok(request)
}
