//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Callers only see
//! jobs they own.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use longform_core::chunk_plan::ContentPoint;
use longform_core::error::CoreError;
use longform_core::job::{
    validate_target_minutes, GenerationParams, Job, NewJob, DEFAULT_MAX_RETRIES, DEFAULT_PRIORITY,
};
use longform_core::outline::{content_points_from_outline, MIN_OUTLINE_MINUTES};
use longform_core::store::create_or_reuse;
use longform_core::types::DbId;
use longform_db::models::job::{EnqueueJob, EnqueueResponse, JobProgress};
use longform_db::models::script_request::ScriptRequest;
use longform_db::repositories::{JobRepo, OutlineRepo};

use super::find_owned_request;
use crate::background;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// `generation_params` keys owned by the server. Client values for these
/// are dropped rather than passed through to prompts.
const RESERVED_PARAM_KEYS: &[&str] = &[
    "title",
    "topic",
    "target_minutes",
    "tone",
    "webhook_url",
    "outline_id",
    "content_plan",
    "content_points",
];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job by ID and verify the caller owns it.
async fn find_and_authorize(state: &AppState, job_id: DbId, auth: &AuthUser) -> AppResult<Job> {
    let job = state
        .store
        .get(job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    if job.owner_id != auth.user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot view another user's job".into(),
        )));
    }
    Ok(job)
}

fn validate_webhook_url(url: Option<&str>) -> Result<(), CoreError> {
    match url {
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => Err(
            CoreError::Validation("webhook_url must be an http(s) URL".into()),
        ),
        _ => Ok(()),
    }
}

/// Enforce the per-owner enqueue limit over the trailing hour.
async fn check_rate_limit(state: &AppState, owner_id: DbId) -> AppResult<()> {
    let since = Utc::now() - chrono::Duration::hours(1);
    let created = JobRepo::count_created_since(&state.pool, owner_id, since).await?;
    if created >= state.config.enqueue_limit_per_hour {
        tracing::info!(owner_id, created, "Enqueue rate limit reached");
        return Err(AppError::Core(CoreError::RateLimited(format!(
            "At most {} jobs may be started per hour",
            state.config.enqueue_limit_per_hour
        ))));
    }
    Ok(())
}

/// Content points the job is planned from, and the outline they came from.
///
/// Long scripts plan from their approved outline and cannot start without
/// one. Shorter scripts take optional points from the client's
/// `generation_params.content_points`.
async fn content_source(
    state: &AppState,
    request: &ScriptRequest,
    target_minutes: u32,
    extra: Option<&serde_json::Value>,
) -> AppResult<(Vec<ContentPoint>, Option<DbId>)> {
    if target_minutes >= MIN_OUTLINE_MINUTES {
        let approved = match request.approval() {
            Some(_) => OutlineRepo::approved_for_request(&state.pool, request.id).await?,
            None => None,
        };
        let outline = approved.ok_or_else(|| {
            CoreError::Validation(format!(
                "Scripts of {MIN_OUTLINE_MINUTES} minutes or more need an approved outline first"
            ))
        })?;
        if i64::from(target_minutes) != i64::from(outline.total_minutes) {
            return Err(AppError::Core(CoreError::Validation(format!(
                "target_minutes must match the approved outline ({} minutes)",
                outline.total_minutes
            ))));
        }
        return Ok((content_points_from_outline(&outline.outline_data), Some(outline.id)));
    }

    let points = extra
        .and_then(|v| v.get("content_points"))
        .and_then(|v| serde_json::from_value::<Vec<ContentPoint>>(v.clone()).ok())
        .unwrap_or_default();
    Ok((points, None))
}

/// Split client `generation_params` into the tone and pass-through extras.
fn client_params(
    value: Option<&serde_json::Value>,
) -> Result<(Option<String>, serde_json::Map<String, serde_json::Value>), CoreError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok((None, serde_json::Map::new()));
    };
    let object = value
        .as_object()
        .ok_or_else(|| CoreError::Validation("generation_params must be a JSON object".into()))?;

    let tone = object
        .get("tone")
        .and_then(|t| t.as_str())
        .map(str::to_string);
    let extra = object
        .iter()
        .filter(|(key, _)| !RESERVED_PARAM_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok((tone, extra))
}

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Start script generation for a request. Returns 201 with the new job, or
/// 200 with the job already active for the request. A created job is
/// picked up by an immediate scheduler pass when enabled, and by the
/// periodic loop otherwise.
pub async fn enqueue_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<EnqueueJob>,
) -> AppResult<impl IntoResponse> {
    let request = find_owned_request(&state.pool, input.request_id, &auth).await?;
    validate_target_minutes(input.target_minutes)?;
    validate_webhook_url(input.webhook_url.as_deref())?;
    let (tone, extra) = client_params(input.generation_params.as_ref())?;

    if let Some(active) = state.store.find_active_for_request(request.id).await? {
        tracing::debug!(job_id = active.id, request_id = request.id, "Reusing active job");
        return Ok((StatusCode::OK, Json(DataResponse { data: enqueue_response(&active) })));
    }

    check_rate_limit(&state, auth.user_id).await?;

    let (points, outline_id) = content_source(
        &state,
        &request,
        input.target_minutes,
        input.generation_params.as_ref(),
    )
    .await?;
    let planned = state.planner.plan(&points, input.target_minutes).await;

    let params = GenerationParams {
        title: request.title.clone(),
        topic: request.topic.clone(),
        target_minutes: input.target_minutes,
        tone,
        webhook_url: input.webhook_url.clone(),
        outline_id,
        content_plan: planned.plan,
        extra,
    };
    let generation_params = params
        .to_value()
        .map_err(|e| AppError::InternalError(format!("Failed to encode generation params: {e}")))?;

    let (job, created) = create_or_reuse(
        state.store.as_ref(),
        NewJob {
            parent_request_id: request.id,
            owner_id: auth.user_id,
            total_chunks: params.content_plan.len() as i32,
            generation_params,
            priority: input.priority.unwrap_or(DEFAULT_PRIORITY),
            max_retries: DEFAULT_MAX_RETRIES,
        },
    )
    .await?;

    if !created {
        return Ok((StatusCode::OK, Json(DataResponse { data: enqueue_response(&job) })));
    }

    tracing::info!(
        job_id = job.id,
        request_id = request.id,
        user_id = auth.user_id,
        target_minutes = input.target_minutes,
        total_chunks = job.total_chunks,
        plan_source = ?planned.source,
        "Job enqueued",
    );

    if state.config.trigger_on_enqueue {
        background::scheduler::spawn_once(Arc::clone(&state.scheduler));
    }

    Ok((StatusCode::CREATED, Json(DataResponse { data: enqueue_response(&job) })))
}

fn enqueue_response(job: &Job) -> EnqueueResponse {
    EnqueueResponse {
        job_id: job.id,
        status: job.status.as_str().to_string(),
        poll_url: format!("/api/v1/jobs/{}", job.id),
    }
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Progress of a job; `result` is present once it has completed.
pub async fn get_job_progress(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_and_authorize(&state, job_id, &auth).await?;
    Ok(Json(DataResponse {
        data: JobProgress::from(&job),
    }))
}
