//! Postgres-backed [`JobStore`].

use async_trait::async_trait;

use longform_core::job::{Job, JobUpdate, NewJob};
use longform_core::store::{JobStore, StoreError};
use longform_core::types::{DbId, Timestamp};

use crate::repositories::job_repo::ACTIVE_JOB_INDEX;
use crate::repositories::JobRepo;
use crate::DbPool;

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Whether `err` is the unique violation on the active-job index.
pub fn is_active_job_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(ACTIVE_JOB_INDEX)
        }
        _ => false,
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: NewJob) -> Result<Job, StoreError> {
        JobRepo::create(&self.pool, &job).await.map_err(|e| {
            if is_active_job_conflict(&e) {
                StoreError::ActiveJobExists(job.parent_request_id)
            } else {
                backend(e)
            }
        })
    }

    async fn claim_next(&self) -> Result<Option<Job>, StoreError> {
        JobRepo::claim_next(&self.pool).await.map_err(backend)
    }

    async fn update(&self, id: DbId, update: JobUpdate) -> Result<Job, StoreError> {
        JobRepo::update(&self.pool, id, &update)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound(id))
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        JobRepo::find_by_id(&self.pool, id).await.map_err(backend)
    }

    async fn find_active_for_request(&self, request_id: DbId) -> Result<Option<Job>, StoreError> {
        JobRepo::find_active_for_request(&self.pool, request_id)
            .await
            .map_err(backend)
    }

    async fn reclaim_stale(&self, cutoff: Timestamp, message: &str) -> Result<Vec<Job>, StoreError> {
        JobRepo::reclaim_stale(&self.pool, cutoff, message)
            .await
            .map_err(backend)
    }
}
