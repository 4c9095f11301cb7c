//! Handlers for outline generation and review.
//!
//! Outlines exist for scripts of at least
//! [`MIN_OUTLINE_MINUTES`](longform_core::outline::MIN_OUTLINE_MINUTES).
//! Generation is gated on research adequacy; every review action is
//! owner-only and starts from `pending`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use longform_core::error::CoreError;
use longform_core::outline::{merge_edits, transition, validate_outline_minutes, OutlineAction};
use longform_core::types::{DbId, Timestamp};
use longform_db::models::outline::{
    GenerateOutline, NewOutline, Outline, RegenerateOutline, ReviewOutline,
};
use longform_db::models::research_source::ResearchSourceRow;
use longform_db::models::script_request::ScriptRequest;
use longform_db::repositories::{OutlineRepo, ResearchSourceRepo};
use longform_pipeline::OutlineInput;

use super::find_owned_request;
use super::script_requests::assess;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Outline as returned to clients, with its status decoded.
#[derive(Debug, Serialize)]
pub struct OutlineView {
    pub id: DbId,
    pub parent_request_id: DbId,
    pub title: String,
    pub total_minutes: i32,
    pub chunk_count: i32,
    pub status: &'static str,
    pub outline: serde_json::Value,
    pub research_score: f64,
    pub user_feedback: Option<String>,
    pub approved_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<Outline> for OutlineView {
    type Error = sqlx::Error;

    fn try_from(outline: Outline) -> Result<Self, Self::Error> {
        Ok(Self {
            status: outline.status()?.as_str(),
            id: outline.id,
            parent_request_id: outline.parent_request_id,
            title: outline.title,
            total_minutes: outline.total_minutes,
            chunk_count: outline.chunk_count,
            outline: outline.outline_data,
            research_score: outline.research_score,
            user_feedback: outline.user_feedback,
            approved_at: outline.approved_at,
            created_at: outline.created_at,
            updated_at: outline.updated_at,
        })
    }
}

/// Response of `POST /script-requests/{id}/outline`.
#[derive(Debug, Serialize)]
pub struct GeneratedOutline {
    pub outline_id: DbId,
    pub outline: serde_json::Value,
    pub research_score: f64,
    pub chunk_count: i32,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch an outline and verify the caller owns its parent request.
async fn find_and_authorize(
    state: &AppState,
    outline_id: DbId,
    auth: &AuthUser,
) -> AppResult<Outline> {
    let outline = OutlineRepo::find_by_id(&state.pool, outline_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Outline",
            id: outline_id,
        }))?;

    find_owned_request(&state.pool, outline.parent_request_id, auth).await?;
    Ok(outline)
}

/// A concurrent review moved the outline out of `pending` between our
/// read and the conditional update.
fn lost_race(outline_id: DbId) -> AppError {
    AppError::Core(CoreError::Conflict(format!(
        "Outline {outline_id} is no longer pending"
    )))
}

fn research_notes(rows: &[ResearchSourceRow]) -> Vec<String> {
    rows.iter()
        .filter(|r| r.is_selected)
        .map(|r| format!("{}: {} ({} words)", r.source_type, r.title, r.word_count))
        .collect()
}

fn outline_input(
    request: &ScriptRequest,
    input: GenerateOutline,
    rows: &[ResearchSourceRow],
    feedback: Option<String>,
) -> OutlineInput {
    OutlineInput {
        title: request.title.clone(),
        topic: request.topic.clone(),
        total_minutes: input.total_minutes,
        content_points: input.content_points.unwrap_or_default(),
        research_notes: research_notes(rows),
        feedback,
    }
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

/// POST /api/v1/script-requests/{id}/outline
///
/// Generate a new pending outline. Any outline still pending for the
/// request is superseded. Feedback from the last rejected or regenerating
/// outline is fed into the prompt.
pub async fn generate_outline(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(input): Json<GenerateOutline>,
) -> AppResult<impl IntoResponse> {
    let request = find_owned_request(&state.pool, request_id, &auth).await?;
    validate_outline_minutes(input.total_minutes)?;

    let rows = ResearchSourceRepo::list_for_request(&state.pool, request_id).await?;
    let report = assess(&state, &rows, input.total_minutes).into_result()?;

    let feedback = OutlineRepo::latest_feedback(&state.pool, request_id).await?;
    let total_minutes = input.total_minutes;
    let draft = state
        .outlines
        .generate(&outline_input(&request, input, &rows, feedback))
        .await?;

    let outline = OutlineRepo::create_superseding(
        &state.pool,
        &NewOutline {
            parent_request_id: request_id,
            title: request.title.clone(),
            total_minutes: total_minutes as i32,
            chunk_count: draft.chunk_count as i32,
            outline_data: draft.data,
            research_score: report.score.overall_score,
        },
    )
    .await?;

    tracing::info!(
        request_id,
        outline_id = outline.id,
        chunk_count = outline.chunk_count,
        sections = draft.content_points.len(),
        "Outline generated",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: GeneratedOutline {
                outline_id: outline.id,
                outline: outline.outline_data,
                research_score: outline.research_score,
                chunk_count: outline.chunk_count,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Latest
// ---------------------------------------------------------------------------

/// GET /api/v1/script-requests/{id}/outline
///
/// The most recent outline in any status, or `null`.
pub async fn latest_outline(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    find_owned_request(&state.pool, request_id, &auth).await?;
    let outline = OutlineRepo::latest_for_request(&state.pool, request_id)
        .await?
        .map(OutlineView::try_from)
        .transpose()?;
    Ok(Json(DataResponse { data: outline }))
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// POST /api/v1/outlines/review
///
/// Approve or reject a pending outline. Approval merges `edits` into the
/// stored outline (leaving it untouched when there are none) and records
/// the approval on the parent request in the same transaction.
pub async fn review_outline(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ReviewOutline>,
) -> AppResult<impl IntoResponse> {
    let outline = find_and_authorize(&state, input.outline_id, &auth).await?;
    let action = OutlineAction::from_review_status(&input.status)?;
    transition(outline.status()?, action)?;

    let feedback = input.feedback.as_deref();
    let updated = match action {
        OutlineAction::Approve => {
            let merged = merge_edits(&outline.outline_data, input.edits.as_ref())?;
            OutlineRepo::approve(&state.pool, outline.id, feedback, merged.as_ref()).await?
        }
        _ => OutlineRepo::transition(&state.pool, outline.id, action.target(), feedback).await?,
    }
    .ok_or_else(|| lost_race(outline.id))?;

    tracing::info!(
        outline_id = updated.id,
        request_id = updated.parent_request_id,
        user_id = auth.user_id,
        status = %action.target(),
        "Outline reviewed",
    );

    Ok(Json(DataResponse {
        data: OutlineView::try_from(updated)?,
    }))
}

// ---------------------------------------------------------------------------
// Regenerate
// ---------------------------------------------------------------------------

/// PUT /api/v1/outlines/regenerate
///
/// Send a pending outline back with feedback. The next
/// `POST /script-requests/{id}/outline` picks the feedback up.
pub async fn regenerate_outline(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<RegenerateOutline>,
) -> AppResult<impl IntoResponse> {
    let outline = find_and_authorize(&state, input.outline_id, &auth).await?;
    let target = transition(outline.status()?, OutlineAction::Regenerate)?;

    let updated = OutlineRepo::transition(
        &state.pool,
        outline.id,
        target,
        input.feedback.as_deref(),
    )
    .await?
    .ok_or_else(|| lost_race(outline.id))?;

    tracing::info!(
        outline_id = updated.id,
        request_id = updated.parent_request_id,
        "Outline sent back for regeneration",
    );

    Ok(Json(DataResponse {
        data: OutlineView::try_from(updated)?,
    }))
}
