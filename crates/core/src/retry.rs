//! Requeue-or-fail policy for jobs whose attempt did not complete.
//!
//! Retries restart the whole job from chunk 1. Priority and creation time
//! are never touched, so a retried job keeps its original queue position.

use crate::job::{Job, JobStatus, JobUpdate, STEP_FAILED, STEP_RETRY_QUEUED};
use crate::types::Timestamp;

/// How an attempt failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, rate limits, upstream 5xx, budget exhaustion, store I/O.
    Retryable,
    /// Malformed requests and validation failures. Retrying cannot help.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to `pending` with the incremented retry count.
    Requeue { retry_count: i32 },
    /// Terminal `failed`.
    Fail,
}

/// Decide what happens after a failed attempt.
pub fn decide(retry_count: i32, max_retries: i32, kind: FailureKind) -> RetryDecision {
    match kind {
        FailureKind::Retryable if retry_count < max_retries => RetryDecision::Requeue {
            retry_count: retry_count + 1,
        },
        _ => RetryDecision::Fail,
    }
}

/// Build the store patch for a failed attempt of `job`.
pub fn failure_update(
    job: &Job,
    kind: FailureKind,
    message: &str,
    now: Timestamp,
) -> (RetryDecision, JobUpdate) {
    let decision = decide(job.retry_count, job.max_retries, kind);
    let update = match decision {
        RetryDecision::Requeue { retry_count } => JobUpdate {
            status: Some(JobStatus::Pending),
            progress: Some(0),
            current_chunk: Some(0),
            current_step: Some(STEP_RETRY_QUEUED.to_string()),
            retry_count: Some(retry_count),
            error_message: Some(message.to_string()),
            ..Default::default()
        },
        RetryDecision::Fail => JobUpdate {
            status: Some(JobStatus::Failed),
            current_step: Some(STEP_FAILED.to_string()),
            error_message: Some(message.to_string()),
            completed_at: Some(now),
            ..Default::default()
        },
    };
    (decision, update)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn job_with_retries(retry_count: i32, max_retries: i32) -> Job {
        let now = Utc::now();
        Job {
            id: 9,
            parent_request_id: 3,
            owner_id: 1,
            status: JobStatus::Processing,
            progress: 60,
            current_chunk: 3,
            total_chunks: 5,
            current_step: "generating_chunk_4_of_5".into(),
            generation_params: serde_json::json!({}),
            priority: 7,
            retry_count,
            max_retries,
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
    fn retryable_failure_requeues_while_budget_remains() {
        assert_eq!(
            decide(0, 3, FailureKind::Retryable),
            RetryDecision::Requeue { retry_count: 1 }
        );
    }

    #[test]
    fn last_retry_moves_count_to_max() {
        assert_eq!(
            decide(2, 3, FailureKind::Retryable),
            RetryDecision::Requeue { retry_count: 3 }
        );
    }

    #[test]
    fn exhausted_budget_fails() {
        assert_eq!(decide(3, 3, FailureKind::Retryable), RetryDecision::Fail);
    }

    #[test]
    fn fatal_failure_never_retries() {
        assert_eq!(decide(0, 3, FailureKind::Fatal), RetryDecision::Fail);
    }

    #[test]
    fn requeue_update_resets_attempt_but_keeps_queue_position() {
        let job = job_with_retries(1, 3);
        let (decision, update) = failure_update(&job, FailureKind::Retryable, "upstream 503", Utc::now());

        assert_eq!(decision, RetryDecision::Requeue { retry_count: 2 });
        assert_eq!(update.status, Some(JobStatus::Pending));
        assert_eq!(update.current_step.as_deref(), Some(STEP_RETRY_QUEUED));
        assert_eq!(update.progress, Some(0));
        assert_eq!(update.error_message.as_deref(), Some("upstream 503"));
        assert!(update.completed_at.is_none());

        let mut requeued = job.clone();
        requeued.apply(&update, Utc::now());
        assert_eq!(requeued.priority, job.priority);
        assert_eq!(requeued.created_at, job.created_at);
    }

    #[test]
    fn fail_update_records_completion_time() {
        let job = job_with_retries(3, 3);
        let now = Utc::now();
        let (decision, update) = failure_update(&job, FailureKind::Retryable, "timeout", now);

        assert_eq!(decision, RetryDecision::Fail);
        assert_eq!(update.status, Some(JobStatus::Failed));
        assert_eq!(update.completed_at, Some(now));
        assert!(update.retry_count.is_none());
    }
}
