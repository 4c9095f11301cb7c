//! Durable job store interface.
//!
//! [`JobStore`] is implemented by `PgJobStore` in `longform-db` and by
//! [`MemoryJobStore`] here. Both must give the same guarantees:
//!
//! - `claim_next` moves exactly one `pending` job to `processing`, choosing
//!   by `priority DESC, created_at ASC`, and never hands the same job to
//!   two concurrent callers.
//! - `update` never lowers progress unless the patch requeues the job.
//! - At most one `pending`/`processing` job exists per parent request;
//!   `create` fails with [`StoreError::ActiveJobExists`] otherwise.

mod memory;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::job::{Job, JobUpdate, NewJob};
use crate::types::{DbId, Timestamp};

pub use memory::MemoryJobStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job {0} not found")]
    NotFound(DbId),

    #[error("Request {0} already has an active job")]
    ActiveJobExists(DbId),

    #[error("Store call timed out after {0}s")]
    Timeout(u64),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::NotFound { entity: "Job", id },
            StoreError::ActiveJobExists(_) => CoreError::Conflict(err.to_string()),
            StoreError::Timeout(_) | StoreError::Backend(_) => CoreError::Persistence(err.to_string()),
        }
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `pending` job.
    async fn create(&self, job: NewJob) -> Result<Job, StoreError>;

    /// Atomically claim the next pending job, if any.
    async fn claim_next(&self) -> Result<Option<Job>, StoreError>;

    /// Apply a partial update and return the stored result.
    async fn update(&self, id: DbId, update: JobUpdate) -> Result<Job, StoreError>;

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError>;

    /// The `pending`/`processing` job for a parent request, if any.
    async fn find_active_for_request(&self, request_id: DbId) -> Result<Option<Job>, StoreError>;

    /// Reclaim jobs stuck in `processing` since before `cutoff`.
    ///
    /// Each reclaimed job is requeued if it has retries left and failed
    /// otherwise, with `message` as its error. Returns the jobs in their
    /// new state. Atomic per job, so concurrent sweeps never double-count
    /// a retry.
    async fn reclaim_stale(&self, cutoff: Timestamp, message: &str) -> Result<Vec<Job>, StoreError>;
}

/// Return the active job for `job.parent_request_id`, creating one if none
/// exists. The flag is `true` when a job was created.
///
/// A concurrent enqueue that wins the race surfaces as
/// [`StoreError::ActiveJobExists`]; the winner is re-read and returned.
pub async fn create_or_reuse(store: &dyn JobStore, job: NewJob) -> Result<(Job, bool), StoreError> {
    let request_id = job.parent_request_id;

    if let Some(existing) = store.find_active_for_request(request_id).await? {
        return Ok((existing, false));
    }

    match store.create(job).await {
        Ok(created) => Ok((created, true)),
        Err(StoreError::ActiveJobExists(_)) => {
            tracing::debug!(request_id, "Lost enqueue race, reusing active job");
            store
                .find_active_for_request(request_id)
                .await?
                .map(|winner| (winner, false))
                .ok_or(StoreError::ActiveJobExists(request_id))
        }
        Err(e) => Err(e),
    }
}

/// Run a store call under `limit`, mapping expiry to [`StoreError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(limit.as_secs())))
}
