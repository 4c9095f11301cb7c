//! Internal trigger for one scheduler pass.
//!
//! Called by an external cron or by operators. Safe to call repeatedly:
//! each call claims at most one job, and a duplicate call either finds the
//! next job or nothing.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use longform_core::error::CoreError;
use longform_core::types::DbId;
use longform_worker::RunOutcome;

use crate::auth::secret::secret_matches;
use crate::background;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying the shared trigger secret.
pub const TRIGGER_SECRET_HEADER: &str = "x-trigger-secret";

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// `idle`, `completed`, `requeued` or `failed`.
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<i32>,
}

impl From<RunOutcome> for TriggerResponse {
    fn from(outcome: RunOutcome) -> Self {
        let (label, retry_count) = match outcome {
            RunOutcome::Idle => ("idle", None),
            RunOutcome::Completed { .. } => ("completed", None),
            RunOutcome::Requeued { retry_count, .. } => ("requeued", Some(retry_count)),
            RunOutcome::Failed { .. } => ("failed", None),
        };
        Self {
            outcome: label,
            job_id: outcome.job_id(),
            retry_count,
        }
    }
}

/// POST /api/v1/internal/trigger
///
/// Runs one scheduler pass and reports what it did. The pass runs on its
/// own task so a client disconnect does not abandon a claimed job.
pub async fn trigger_scheduler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    if state.config.trigger_secret.is_empty() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Internal trigger is disabled".into(),
        )));
    }

    let provided = headers
        .get(TRIGGER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !secret_matches(provided, &state.config.trigger_secret) {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid trigger secret".into(),
        )));
    }

    let outcome = background::scheduler::spawn_once(Arc::clone(&state.scheduler))
        .await
        .map_err(|e| AppError::InternalError(format!("Scheduler pass panicked: {e}")))??;

    tracing::info!(?outcome, "Scheduler pass triggered");
    Ok(Json(DataResponse {
        data: TriggerResponse::from(outcome),
    }))
}
