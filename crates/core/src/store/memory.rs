use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{JobStore, StoreError};
use crate::job::{Job, JobStatus, JobUpdate, NewJob, STEP_CLAIMED, STEP_QUEUED};
use crate::retry::{failure_update, FailureKind};
use crate::types::{DbId, Timestamp};

/// In-process [`JobStore`] guarded by a single mutex.
///
/// Used by unit tests and by local runs without a database.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
    fail_next_update: AtomicBool,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: DbId,
    jobs: BTreeMap<DbId, Job>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `update` call fail with a backend error.
    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }

    /// Snapshot of every stored job, ordered by id.
    pub async fn all(&self) -> Vec<Job> {
        self.inner.lock().await.jobs.values().cloned().collect()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: NewJob) -> Result<Job, StoreError> {
        let mut inner = self.inner.lock().await;

        let active = inner
            .jobs
            .values()
            .any(|j| j.parent_request_id == job.parent_request_id && j.status.is_active());
        if active {
            return Err(StoreError::ActiveJobExists(job.parent_request_id));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let created = Job {
            id: inner.next_id,
            parent_request_id: job.parent_request_id,
            owner_id: job.owner_id,
            status: JobStatus::Pending,
            progress: 0,
            current_chunk: 0,
            total_chunks: job.total_chunks,
            current_step: STEP_QUEUED.to_string(),
            generation_params: job.generation_params,
            priority: job.priority,
            retry_count: 0,
            max_retries: job.max_retries,
            error_message: None,
            result: None,
            elapsed_secs: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };
        inner.jobs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn claim_next(&self) -> Result<Option<Job>, StoreError> {
        let mut inner = self.inner.lock().await;

        let next_id = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            })
            .map(|j| j.id);

        let Some(id) = next_id else {
            return Ok(None);
        };
        let now = Utc::now();
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.status = JobStatus::Processing;
        job.current_step = STEP_CLAIMED.to_string();
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn update(&self, id: DbId, update: JobUpdate) -> Result<Job, StoreError> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected update failure".into()));
        }

        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.apply(&update, Utc::now());
        Ok(job.clone())
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }

    async fn find_active_for_request(&self, request_id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .jobs
            .values()
            .find(|j| j.parent_request_id == request_id && j.status.is_active())
            .cloned())
    }

    async fn reclaim_stale(&self, cutoff: Timestamp, message: &str) -> Result<Vec<Job>, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let mut reclaimed = Vec::new();
        for job in inner.jobs.values_mut() {
            let stale = job.status == JobStatus::Processing
                && job.started_at.is_some_and(|started| started < cutoff);
            if !stale {
                continue;
            }
            let (_, update) = failure_update(job, FailureKind::Retryable, message, now);
            job.apply(&update, now);
            reclaimed.push(job.clone());
        }
        Ok(reclaimed)
    }
}
