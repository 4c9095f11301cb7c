//! Handlers for script requests and their research sources.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use longform_core::error::CoreError;
use longform_core::job::validate_target_minutes;
use longform_core::research::{AdequacyReport, ResearchSource};
use longform_core::types::DbId;
use longform_db::models::research_source::{CreateResearchSource, ResearchSourceRow};
use longform_db::models::script_request::CreateScriptRequest;
use longform_db::repositories::{ResearchSourceRepo, ScriptRequestRepo};

use super::find_owned_request;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/script-requests
pub async fn create_script_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateScriptRequest>,
) -> AppResult<impl IntoResponse> {
    if input.title.trim().is_empty() {
        return Err(CoreError::Validation("title must not be empty".into()).into());
    }
    let minutes = u32::try_from(input.target_minutes)
        .map_err(|_| CoreError::Validation("target_minutes must be positive".into()))?;
    validate_target_minutes(minutes)?;

    let request = ScriptRequestRepo::create(&state.pool, auth.user_id, &input).await?;

    tracing::info!(
        request_id = request.id,
        user_id = auth.user_id,
        target_minutes = request.target_minutes,
        "Script request created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// GET /api/v1/script-requests/{id}
pub async fn get_script_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let request = find_owned_request(&state.pool, request_id, &auth).await?;
    Ok(Json(DataResponse { data: request }))
}

// ---------------------------------------------------------------------------
// Research sources
// ---------------------------------------------------------------------------

fn validate_source(input: &CreateResearchSource) -> Result<(), CoreError> {
    if input.source_type.trim().is_empty() {
        return Err(CoreError::Validation("source_type must not be empty".into()));
    }
    if input.word_count < 0 {
        return Err(CoreError::Validation("word_count must not be negative".into()));
    }
    if let Some(quality) = input.quality_score {
        if !(0.0..=1.0).contains(&quality) {
            return Err(CoreError::Validation(
                "quality_score must be between 0 and 1".into(),
            ));
        }
    }
    Ok(())
}

/// POST /api/v1/script-requests/{id}/sources
pub async fn add_source(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(input): Json<CreateResearchSource>,
) -> AppResult<impl IntoResponse> {
    find_owned_request(&state.pool, request_id, &auth).await?;
    validate_source(&input)?;

    let source = ResearchSourceRepo::create(&state.pool, request_id, &input).await?;
    tracing::debug!(
        request_id,
        source_id = source.id,
        word_count = source.word_count,
        "Research source added",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: source })))
}

/// GET /api/v1/script-requests/{id}/sources
pub async fn list_sources(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    find_owned_request(&state.pool, request_id, &auth).await?;
    let sources = ResearchSourceRepo::list_for_request(&state.pool, request_id).await?;
    Ok(Json(DataResponse { data: sources }))
}

#[derive(Debug, Deserialize)]
pub struct ResearchScoreQuery {
    /// Duration to check against; defaults to the request's target.
    pub total_minutes: Option<u32>,
}

/// Score `rows` against the policy bracket for `total_minutes`.
pub(crate) fn assess(
    state: &AppState,
    rows: &[ResearchSourceRow],
    total_minutes: u32,
) -> AdequacyReport {
    let sources: Vec<ResearchSource> = rows.iter().map(ResearchSource::from).collect();
    let has_user_documents = rows.iter().any(|r| r.is_user_document);
    state
        .research_policy
        .is_adequate(&sources, total_minutes, has_user_documents)
}

/// GET /api/v1/script-requests/{id}/research-score
///
/// Always 200: an inadequate report is data here, not an error.
pub async fn research_score(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Query(params): Query<ResearchScoreQuery>,
) -> AppResult<impl IntoResponse> {
    let request = find_owned_request(&state.pool, request_id, &auth).await?;
    let total_minutes = params
        .total_minutes
        .unwrap_or_else(|| u32::try_from(request.target_minutes).unwrap_or(0));

    let rows = ResearchSourceRepo::list_for_request(&state.pool, request_id).await?;
    let report = assess(&state, &rows, total_minutes);

    Ok(Json(DataResponse { data: report }))
}
