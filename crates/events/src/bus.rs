//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the scheduler, which
//! publishes, and the notifier, which subscribes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use longform_core::job::{GenerationParams, Job};
use longform_core::types::DbId;

pub const EVENT_JOB_COMPLETED: &str = "job.completed";
pub const EVENT_JOB_FAILED: &str = "job.failed";
pub const EVENT_JOB_RETRY_QUEUED: &str = "job.retry_queued";

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Something that happened to a generation job.
///
/// Built with one of the lifecycle constructors ([`completed`],
/// [`failed`], [`retry_queued`]) from the job as persisted.
///
/// [`completed`]: JobEvent::completed
/// [`failed`]: JobEvent::failed
/// [`retry_queued`]: JobEvent::retry_queued
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"job.completed"`.
    pub event_type: String,
    pub job_id: DbId,
    pub request_id: DbId,
    pub owner_id: DbId,

    /// Where to POST the event. Not part of the delivered body.
    #[serde(skip)]
    pub webhook_url: Option<String>,

    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(event_type: impl Into<String>, job: &Job) -> Self {
        let webhook_url = GenerationParams::from_job(job)
            .ok()
            .and_then(|p| p.webhook_url)
            .filter(|url| !url.trim().is_empty());
        Self {
            event_type: event_type.into(),
            job_id: job.id,
            request_id: job.parent_request_id,
            owner_id: job.owner_id,
            webhook_url,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// The job finished. The payload summarizes the result without the
    /// script text.
    pub fn completed(job: &Job) -> Self {
        let result = job.result.as_ref();
        Self::new(EVENT_JOB_COMPLETED, job).with_payload(serde_json::json!({
            "status": job.status.as_str(),
            "elapsed_secs": job.elapsed_secs,
            "word_count": result.and_then(|r| r.get("word_count")),
            "chunk_count": result.and_then(|r| r.get("chunk_count")),
        }))
    }

    pub fn failed(job: &Job) -> Self {
        Self::new(EVENT_JOB_FAILED, job).with_payload(serde_json::json!({
            "status": job.status.as_str(),
            "error_message": job.error_message,
            "retry_count": job.retry_count,
        }))
    }

    pub fn retry_queued(job: &Job) -> Self {
        Self::new(EVENT_JOB_RETRY_QUEUED, job).with_payload(serde_json::json!({
            "status": job.status.as_str(),
            "error_message": job.error_message,
            "retry_count": job.retry_count,
            "max_retries": job.max_retries,
        }))
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped when nobody listens.
    pub fn publish(&self, event: JobEvent) {
        tracing::debug!(event_type = %event.event_type, job_id = event.job_id, "Publishing job event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use longform_core::job::JobStatus;

    use super::*;

    pub(crate) fn job(params: serde_json::Value) -> Job {
        let now = Utc::now();
        Job {
            id: 11,
            parent_request_id: 3,
            owner_id: 9,
            status: JobStatus::Completed,
            progress: 100,
            current_chunk: 3,
            total_chunks: 3,
            current_step: "completed".into(),
            generation_params: params,
            priority: 0,
            retry_count: 1,
            max_retries: 3,
            error_message: None,
            result: Some(serde_json::json!({"script": "long text", "word_count": 5200, "chunk_count": 3})),
            elapsed_secs: Some(240),
            created_at: now,
            started_at: Some(now),
            completed_at: Some(now),
            updated_at: now,
        }
    }

    #[test]
    fn completed_event_summarizes_without_script() {
        let event = JobEvent::completed(&job(serde_json::json!({
            "title": "Tea",
            "target_minutes": 35,
            "webhook_url": "https://hooks.example.com/done"
        })));

        assert_eq!(event.event_type, EVENT_JOB_COMPLETED);
        assert_eq!(event.request_id, 3);
        assert_eq!(event.webhook_url.as_deref(), Some("https://hooks.example.com/done"));
        assert_eq!(event.payload["word_count"], 5200);
        assert!(event.payload.get("script").is_none());
    }

    #[test]
    fn unreadable_params_mean_no_webhook() {
        let event = JobEvent::failed(&job(serde_json::json!({"webhook_url": 5})));
        assert!(event.webhook_url.is_none());
        assert_eq!(event.payload["retry_count"], 1);
    }

    #[test]
    fn webhook_url_is_not_serialized() {
        let event = JobEvent::retry_queued(&job(serde_json::json!({}))).with_webhook("https://x");
        let body = serde_json::to_value(&event).unwrap();
        assert!(body.get("webhook_url").is_none());
        assert_eq!(body["event_type"], EVENT_JOB_RETRY_QUEUED);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(JobEvent::failed(&job(serde_json::json!({}))));

        assert_eq!(rx1.recv().await.unwrap().event_type, EVENT_JOB_FAILED);
        assert_eq!(rx2.recv().await.unwrap().job_id, 11);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(JobEvent::failed(&job(serde_json::json!({}))));
    }
}
