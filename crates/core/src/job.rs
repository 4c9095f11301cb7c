//! Generation job model, step labels, and progress arithmetic.
//!
//! A [`Job`] is one long-form generation request moving through
//! `pending -> processing -> completed | failed`. Retries put a job back
//! into `pending`; see [`crate::retry`].

use serde::{Deserialize, Serialize};

use crate::chunk_plan::ContentPlan;
use crate::define_status_enum;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

define_status_enum! {
    /// Generation job execution status.
    JobStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

impl JobStatus {
    /// Pending and processing jobs count toward the one-active-job-per-request rule.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Step labels
// ---------------------------------------------------------------------------

pub const STEP_QUEUED: &str = "queued";
pub const STEP_CLAIMED: &str = "claimed";
pub const STEP_INITIALIZING: &str = "initializing";
pub const STEP_FINALIZING: &str = "finalizing";
pub const STEP_COMPLETED: &str = "completed";
pub const STEP_RETRY_QUEUED: &str = "retry_queued";
pub const STEP_FAILED: &str = "failed";

/// Step label while chunk `chunk_number` (1-based) is being generated.
pub fn generating_step(chunk_number: usize, total_chunks: usize) -> String {
    format!("generating_chunk_{chunk_number}_of_{total_chunks}")
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Progress recorded as soon as a claimed job starts initializing.
pub const INITIAL_PROGRESS: i16 = 5;

/// Retry budget for new jobs when the caller does not specify one.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Default queue priority. Higher runs sooner.
pub const DEFAULT_PRIORITY: i32 = 0;

pub const MIN_TARGET_MINUTES: u32 = 1;
pub const MAX_TARGET_MINUTES: u32 = 90;

pub fn validate_target_minutes(minutes: u32) -> Result<(), CoreError> {
    if !(MIN_TARGET_MINUTES..=MAX_TARGET_MINUTES).contains(&minutes) {
        return Err(CoreError::Validation(format!(
            "target_minutes must be between {MIN_TARGET_MINUTES} and {MAX_TARGET_MINUTES}"
        )));
    }
    Ok(())
}

/// Progress after finishing chunk `chunk_index` (0-based) of `total_chunks`:
/// `round((chunk_index + 1) / total_chunks * 100)`, clamped to `0..=100`.
pub fn chunk_progress(chunk_index: usize, total_chunks: usize) -> i16 {
    if total_chunks == 0 {
        return 100;
    }
    let pct = ((chunk_index + 1) as f64 / total_chunks as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as i16
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A generation job as seen by the scheduler and the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: DbId,
    pub parent_request_id: DbId,
    pub owner_id: DbId,
    pub status: JobStatus,
    pub progress: i16,
    pub current_chunk: i32,
    pub total_chunks: i32,
    pub current_step: String,
    pub generation_params: serde_json::Value,
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error_message: Option<String>,
    pub result: Option<serde_json::Value>,
    pub elapsed_secs: Option<i32>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Job {
    /// Apply a patch in place, using the same rules as the SQL store:
    ///
    /// - `progress` never decreases unless the patch moves the job back
    ///   to `pending` (a retry starts a fresh attempt).
    /// - `clear_error` wins over `error_message`.
    pub fn apply(&mut self, update: &JobUpdate, now: Timestamp) {
        let requeue = update.status == Some(JobStatus::Pending);

        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = if requeue {
                progress
            } else {
                self.progress.max(progress)
            };
        }
        if let Some(chunk) = update.current_chunk {
            self.current_chunk = chunk;
        }
        if let Some(step) = &update.current_step {
            self.current_step = step.clone();
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }
        if update.clear_error {
            self.error_message = None;
        } else if let Some(message) = &update.error_message {
            self.error_message = Some(message.clone());
        }
        if let Some(result) = &update.result {
            self.result = Some(result.clone());
        }
        if let Some(elapsed) = update.elapsed_secs {
            self.elapsed_secs = Some(elapsed);
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = Some(completed_at);
        }
        self.updated_at = now;
    }
}

/// Typed view of `Job::generation_params`.
///
/// Keys not listed here are kept in `extra` and passed through to prompt
/// building untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub title: String,
    #[serde(default)]
    pub topic: String,
    pub target_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline_id: Option<DbId>,
    #[serde(default)]
    pub content_plan: ContentPlan,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationParams {
    pub fn from_job(job: &Job) -> Result<Self, serde_json::Error> {
        serde_json::from_value(job.generation_params.clone())
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Input for creating a job. New jobs always start in `pending`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub parent_request_id: DbId,
    pub owner_id: DbId,
    pub total_chunks: i32,
    pub generation_params: serde_json::Value,
    pub priority: i32,
    pub max_retries: i32,
}

/// Partial update of a job. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<i16>,
    pub current_chunk: Option<i32>,
    pub current_step: Option<String>,
    pub retry_count: Option<i32>,
    pub error_message: Option<String>,
    pub clear_error: bool,
    pub result: Option<serde_json::Value>,
    pub elapsed_secs: Option<i32>,
    pub completed_at: Option<Timestamp>,
}

impl JobUpdate {
    /// Step label + progress, used for `initializing` and similar markers.
    pub fn step(step: impl Into<String>, progress: i16) -> Self {
        Self {
            current_step: Some(step.into()),
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Record that chunk `chunk_index` (0-based) finished.
    pub fn chunk_finished(chunk_index: usize, total_chunks: usize) -> Self {
        let next_step = if chunk_index + 1 >= total_chunks {
            STEP_FINALIZING.to_string()
        } else {
            generating_step(chunk_index + 2, total_chunks)
        };
        Self {
            current_chunk: Some((chunk_index + 1) as i32),
            progress: Some(chunk_progress(chunk_index, total_chunks)),
            current_step: Some(next_step),
            ..Default::default()
        }
    }

    /// Terminal success.
    pub fn completed(result: serde_json::Value, elapsed_secs: i32, now: Timestamp) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            current_step: Some(STEP_COMPLETED.to_string()),
            clear_error: true,
            result: Some(result),
            elapsed_secs: Some(elapsed_secs),
            completed_at: Some(now),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample_job() -> Job {
        let now = Utc::now();
        Job {
            id: 1,
            parent_request_id: 10,
            owner_id: 100,
            status: JobStatus::Processing,
            progress: 40,
            current_chunk: 2,
            total_chunks: 5,
            current_step: STEP_INITIALIZING.to_string(),
            generation_params: serde_json::json!({}),
            priority: 0,
            retry_count: 0,
            max_retries: 3,
            error_message: None,
            result: None,
            elapsed_secs: None,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn chunk_progress_rounds_to_nearest_percent() {
        assert_eq!(chunk_progress(0, 3), 33);
        assert_eq!(chunk_progress(1, 3), 67);
        assert_eq!(chunk_progress(2, 3), 100);
        assert_eq!(chunk_progress(0, 4), 25);
        assert_eq!(chunk_progress(3, 4), 100);
    }

    #[test]
    fn chunk_progress_with_no_chunks_is_complete() {
        assert_eq!(chunk_progress(0, 0), 100);
    }

    #[test]
    fn target_minutes_bounds() {
        assert!(validate_target_minutes(1).is_ok());
        assert!(validate_target_minutes(90).is_ok());
        assert!(validate_target_minutes(0).is_err());
        assert!(validate_target_minutes(91).is_err());
    }

    #[test]
    fn active_statuses() {
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Processing.is_active());
        assert!(!JobStatus::Completed.is_active());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn apply_never_lowers_progress_while_processing() {
        let mut job = sample_job();
        job.apply(&JobUpdate::step(STEP_INITIALIZING, 5), Utc::now());
        assert_eq!(job.progress, 40);
        assert_eq!(job.current_step, STEP_INITIALIZING);
    }

    #[test]
    fn apply_resets_progress_on_requeue() {
        let mut job = sample_job();
        let update = JobUpdate {
            status: Some(JobStatus::Pending),
            progress: Some(0),
            ..Default::default()
        };
        job.apply(&update, Utc::now());
        assert_eq!(job.progress, 0);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn completed_update_clears_previous_error() {
        let mut job = sample_job();
        job.error_message = Some("timeout".into());
        job.apply(
            &JobUpdate::completed(serde_json::json!({"script": "x"}), 12, Utc::now()),
            Utc::now(),
        );
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.error_message.is_none());
        assert_eq!(job.elapsed_secs, Some(12));
    }

    #[test]
    fn chunk_finished_points_step_at_next_chunk() {
        let update = JobUpdate::chunk_finished(0, 4);
        assert_eq!(update.current_chunk, Some(1));
        assert_eq!(update.progress, Some(25));
        assert_eq!(update.current_step.as_deref(), Some("generating_chunk_2_of_4"));
    }

    #[test]
    fn last_chunk_moves_to_finalizing() {
        let update = JobUpdate::chunk_finished(3, 4);
        assert_eq!(update.progress, Some(100));
        assert_eq!(update.current_step.as_deref(), Some(STEP_FINALIZING));
    }

    #[test]
    fn generation_params_keep_unknown_keys() {
        let mut job = sample_job();
        job.generation_params = serde_json::json!({
            "title": "Tea",
            "target_minutes": 35,
            "style": "documentary",
            "webhook_url": "https://example.com/hook"
        });

        let params = GenerationParams::from_job(&job).unwrap();
        assert_eq!(params.target_minutes, 35);
        assert!(params.content_plan.is_empty());
        assert_eq!(params.extra["style"], "documentary");
        assert_eq!(params.webhook_url.as_deref(), Some("https://example.com/hook"));

        let value = params.to_value().unwrap();
        assert_eq!(value["style"], "documentary");
        assert!(value.get("tone").is_none());
    }
}
