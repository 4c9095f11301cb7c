//! Repository for the `jobs` table.
//!
//! Status literals always come from `JobStatus`; no magic numbers.

use sqlx::PgPool;

use longform_core::job::{
    Job, JobStatus, JobUpdate, NewJob, STEP_CLAIMED, STEP_FAILED, STEP_QUEUED, STEP_RETRY_QUEUED,
};
use longform_core::types::{DbId, Timestamp};

use crate::models::job::JobRow;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, parent_request_id, owner_id, status_id, progress, \
    current_chunk, total_chunks, current_step, generation_params, \
    priority, retry_count, max_retries, error_message, result, elapsed_secs, \
    started_at, completed_at, created_at, updated_at";

/// Name of the partial unique index guarding one active job per request.
pub const ACTIVE_JOB_INDEX: &str = "uq_jobs_active_request";

fn into_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, sqlx::Error> {
    rows.into_iter().map(Job::try_from).collect()
}

pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    ///
    /// Fails with a unique violation on [`ACTIVE_JOB_INDEX`] if the request
    /// already has a pending or processing job.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                (parent_request_id, owner_id, status_id, total_chunks, current_step, \
                 generation_params, priority, max_retries) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(input.parent_request_id)
            .bind(input.owner_id)
            .bind(JobStatus::Pending.id())
            .bind(input.total_chunks)
            .bind(STEP_QUEUED)
            .bind(&input.generation_params)
            .bind(input.priority)
            .bind(input.max_retries)
            .fetch_one(pool)
            .await?
            .try_into()
    }

    /// Atomically claim the highest-priority, oldest pending job.
    ///
    /// `FOR UPDATE SKIP LOCKED` keeps concurrent schedulers from claiming
    /// the same row.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, current_step = $2, started_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $3 \
                 ORDER BY priority DESC, created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Processing.id())
            .bind(STEP_CLAIMED)
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await?
            .map(Job::try_from)
            .transpose()?;
        if let Some(job) = &job {
            tracing::debug!(
                job_id = job.id,
                request_id = job.parent_request_id,
                priority = job.priority,
                retry_count = job.retry_count,
                "Claimed pending job",
            );
        }
        Ok(job)
    }

    /// Apply a partial update.
    ///
    /// Progress uses `GREATEST` so it never goes backwards, except when the
    /// same update moves the job back to pending.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        update: &JobUpdate,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET \
                status_id = COALESCE($2, status_id), \
                progress = CASE \
                    WHEN $3::SMALLINT IS NULL THEN progress \
                    WHEN $2::SMALLINT = $12 THEN $3 \
                    ELSE GREATEST(progress, $3) END, \
                current_chunk = COALESCE($4, current_chunk), \
                current_step = COALESCE($5, current_step), \
                retry_count = COALESCE($6, retry_count), \
                error_message = CASE WHEN $8 THEN NULL ELSE COALESCE($7, error_message) END, \
                result = COALESCE($9, result), \
                elapsed_secs = COALESCE($10, elapsed_secs), \
                completed_at = COALESCE($11, completed_at) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(update.status.map(JobStatus::id))
            .bind(update.progress)
            .bind(update.current_chunk)
            .bind(update.current_step.as_deref())
            .bind(update.retry_count)
            .bind(update.error_message.as_deref())
            .bind(update.clear_error)
            .bind(update.result.as_ref())
            .bind(update.elapsed_secs)
            .bind(update.completed_at)
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// The pending or processing job for a parent request.
    pub async fn find_active_for_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE parent_request_id = $1 AND status_id IN ($2, $3)"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(request_id)
            .bind(JobStatus::Pending.id())
            .bind(JobStatus::Processing.id())
            .fetch_optional(pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// Jobs for a parent request, newest first.
    pub async fn list_for_request(pool: &PgPool, request_id: DbId) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE parent_request_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(request_id)
            .fetch_all(pool)
            .await?;
        into_jobs(rows)
    }

    /// Jobs an owner created since `since`; feeds the per-owner enqueue limit.
    pub async fn count_created_since(
        pool: &PgPool,
        owner_id: DbId,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM jobs WHERE owner_id = $1 AND created_at >= $2",
        )
        .bind(owner_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Requeue or fail every job stuck in processing since before `cutoff`.
    ///
    /// Mirrors `longform_core::retry`: jobs with retries left go back to
    /// pending with a fresh attempt, the rest fail. All right-hand sides
    /// read the pre-update row, so the branches agree.
    pub async fn reclaim_stale(
        pool: &PgPool,
        cutoff: Timestamp,
        message: &str,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET \
                status_id = CASE WHEN retry_count < max_retries THEN $3 ELSE $4 END, \
                retry_count = CASE WHEN retry_count < max_retries THEN retry_count + 1 ELSE retry_count END, \
                progress = CASE WHEN retry_count < max_retries THEN 0 ELSE progress END, \
                current_chunk = CASE WHEN retry_count < max_retries THEN 0 ELSE current_chunk END, \
                current_step = CASE WHEN retry_count < max_retries THEN $5 ELSE $6 END, \
                completed_at = CASE WHEN retry_count < max_retries THEN completed_at ELSE NOW() END, \
                error_message = $7 \
             WHERE id IN ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $2 AND started_at < $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(cutoff)
            .bind(JobStatus::Processing.id())
            .bind(JobStatus::Pending.id())
            .bind(JobStatus::Failed.id())
            .bind(STEP_RETRY_QUEUED)
            .bind(STEP_FAILED)
            .bind(message)
            .fetch_all(pool)
            .await?;
        let jobs = into_jobs(rows)?;
        if !jobs.is_empty() {
            tracing::warn!(
                count = jobs.len(),
                job_ids = ?jobs.iter().map(|j| j.id).collect::<Vec<_>>(),
                "Reclaimed stale processing jobs",
            );
        }
        Ok(jobs)
    }
}
