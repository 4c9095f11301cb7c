//! Claim-and-run loop for generation jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use longform_core::error::CoreError;
use longform_core::generation::GenerationService;
use longform_core::job::{Job, JobStatus, JobUpdate, INITIAL_PROGRESS, STEP_INITIALIZING};
use longform_core::retry::{failure_update, FailureKind, RetryDecision};
use longform_core::store::{bounded, JobStore, StoreError};
use longform_core::types::DbId;
use longform_events::{EventBus, JobEvent};
use longform_pipeline::GenerationOrchestrator;

use crate::config::SchedulerConfig;

/// Error message recorded on jobs reclaimed by the stale sweep.
pub const STALE_MESSAGE: &str = "stale: job exceeded twice its time budget without finishing";

/// What a single [`Scheduler::run_once`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No pending job.
    Idle,
    Completed { job_id: DbId },
    Requeued { job_id: DbId, retry_count: i32 },
    Failed { job_id: DbId },
}

impl RunOutcome {
    pub fn job_id(&self) -> Option<DbId> {
        match self {
            Self::Idle => None,
            Self::Completed { job_id } | Self::Requeued { job_id, .. } | Self::Failed { job_id } => {
                Some(*job_id)
            }
        }
    }
}

pub struct Scheduler {
    store: Arc<dyn JobStore>,
    orchestrator: GenerationOrchestrator,
    events: Arc<EventBus>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        service: Arc<dyn GenerationService>,
        events: Arc<EventBus>,
        config: SchedulerConfig,
    ) -> Self {
        let orchestrator =
            GenerationOrchestrator::new(service, Arc::clone(&store), config.store_timeout());
        Self {
            store,
            orchestrator,
            events,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Sweep stale jobs, then claim and run at most one pending job.
    ///
    /// Failures of the attempt itself are absorbed by the retry policy and
    /// reported through the outcome. Only store failures surface as errors.
    pub async fn run_once(&self) -> Result<RunOutcome, CoreError> {
        self.sweep_stale().await?;

        let Some(job) = self.store_call(self.store.claim_next()).await? else {
            tracing::debug!("No pending jobs");
            return Ok(RunOutcome::Idle);
        };

        let started = Instant::now();
        let deadline = started + self.config.budget();
        tracing::info!(
            job_id = job.id,
            request_id = job.parent_request_id,
            retry_count = job.retry_count,
            budget_secs = self.config.budget().as_secs(),
            "Claimed job",
        );

        self.store_call(
            self.store
                .update(job.id, JobUpdate::step(STEP_INITIALIZING, INITIAL_PROGRESS)),
        )
        .await?;

        match self.orchestrator.run(&job, deadline).await {
            Ok(script) => match script.to_value() {
                Ok(result) => {
                    let elapsed = i32::try_from(started.elapsed().as_secs()).unwrap_or(i32::MAX);
                    self.complete(&job, result, elapsed).await
                }
                Err(e) => {
                    self.fail(&job, FailureKind::Fatal, &format!("Result could not be encoded: {e}"))
                        .await
                }
            },
            Err(e) => {
                tracing::warn!(job_id = job.id, error = %e, "Generation attempt failed");
                self.fail(&job, e.failure_kind(), &e.to_string()).await
            }
        }
    }

    /// Requeue or fail every job stuck in `processing` for longer than
    /// twice the run budget.
    pub async fn sweep_stale(&self) -> Result<Vec<Job>, CoreError> {
        let stale_after = chrono::Duration::from_std(self.config.stale_after())
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        let cutoff = Utc::now() - stale_after;

        let reclaimed = self
            .store_call(self.store.reclaim_stale(cutoff, STALE_MESSAGE))
            .await?;

        for job in &reclaimed {
            tracing::warn!(
                job_id = job.id,
                status = %job.status,
                retry_count = job.retry_count,
                "Reclaimed stale job",
            );
            self.events.publish(match job.status {
                JobStatus::Pending => JobEvent::retry_queued(job),
                _ => JobEvent::failed(job),
            });
        }
        Ok(reclaimed)
    }

    /// Run until `cancel` fires: one `run_once` per poll tick and a stale
    /// sweep on its own interval.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            poll_secs = self.config.poll_secs,
            sweep_interval_secs = self.config.sweep_interval_secs,
            "Scheduler started",
        );

        let mut poll = tokio::time::interval(Duration::from_secs(self.config.poll_secs.max(1)));
        let mut sweep =
            tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler stopping");
                    break;
                }
                _ = poll.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Scheduler run failed");
                    }
                }
                _ = sweep.tick() => {
                    if let Err(e) = self.sweep_stale().await {
                        tracing::error!(error = %e, "Stale job sweep failed");
                    }
                }
            }
        }
    }

    async fn complete(
        &self,
        job: &Job,
        result: serde_json::Value,
        elapsed_secs: i32,
    ) -> Result<RunOutcome, CoreError> {
        let update = JobUpdate::completed(result, elapsed_secs, Utc::now());
        let stored = self
            .store_call(self.store.update(job.id, update))
            .await
            .inspect_err(|e| {
                tracing::error!(job_id = job.id, error = %e, "Failed to persist completed job");
            })?;

        tracing::info!(job_id = job.id, elapsed_secs, "Job completed");
        self.events.publish(JobEvent::completed(&stored));
        Ok(RunOutcome::Completed { job_id: job.id })
    }

    async fn fail(&self, job: &Job, kind: FailureKind, message: &str) -> Result<RunOutcome, CoreError> {
        let (decision, update) = failure_update(job, kind, message, Utc::now());
        let stored = self
            .store_call(self.store.update(job.id, update))
            .await
            .inspect_err(|e| {
                tracing::error!(job_id = job.id, error = %e, "Failed to persist job failure");
            })?;

        match decision {
            RetryDecision::Requeue { retry_count } => {
                tracing::info!(job_id = job.id, retry_count, "Job requeued for retry");
                self.events.publish(JobEvent::retry_queued(&stored));
                Ok(RunOutcome::Requeued {
                    job_id: job.id,
                    retry_count,
                })
            }
            RetryDecision::Fail => {
                tracing::warn!(job_id = job.id, error = message, "Job failed");
                self.events.publish(JobEvent::failed(&stored));
                Ok(RunOutcome::Failed { job_id: job.id })
            }
        }
    }

    async fn store_call<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, CoreError> {
        Ok(bounded(self.config.store_timeout(), call).await?)
    }
}
