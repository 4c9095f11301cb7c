//! Generation job rows and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use longform_core::job::Job;
use longform_core::status::StatusId;
use longform_core::types::{DbId, Timestamp};

use super::status::decode_job_status;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: DbId,
    pub parent_request_id: DbId,
    pub owner_id: DbId,
    pub status_id: StatusId,
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
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = sqlx::Error;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            parent_request_id: row.parent_request_id,
            owner_id: row.owner_id,
            status: decode_job_status(row.status_id)?,
            progress: row.progress,
            current_chunk: row.current_chunk,
            total_chunks: row.total_chunks,
            current_step: row.current_step,
            generation_params: row.generation_params,
            priority: row.priority,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            error_message: row.error_message,
            result: row.result,
            elapsed_secs: row.elapsed_secs,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        })
    }
}

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct EnqueueJob {
    pub request_id: DbId,
    pub target_minutes: u32,
    pub priority: Option<i32>,
    /// Opaque parameters passed through to prompt building (tone, style, ...).
    pub generation_params: Option<serde_json::Value>,
    /// Receives `job.completed` / `job.failed` notifications.
    pub webhook_url: Option<String>,
}

/// Response of `POST /api/v1/jobs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: DbId,
    pub status: String,
    pub poll_url: String,
}

/// Response of `GET /api/v1/jobs/{id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: DbId,
    pub status: String,
    pub progress: i16,
    pub current_step: String,
    pub current_chunk: i32,
    pub total_chunks: i32,
    pub retry_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl From<&Job> for JobProgress {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status.as_str().to_string(),
            progress: job.progress,
            current_step: job.current_step.clone(),
            current_chunk: job.current_chunk,
            total_chunks: job.total_chunks,
            retry_count: job.retry_count,
            error_message: job.error_message.clone(),
            result: job.result.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}
