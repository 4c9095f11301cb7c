//! Chunk-by-chunk script generation for one claimed job.
//!
//! The orchestrator walks the job's precomputed [`ContentPlan`] in order,
//! asks the generation service for each chunk, and persists progress after
//! every chunk. Any failure aborts the attempt and drops the text written
//! so far; the caller decides whether to requeue.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use longform_core::chunk_plan::ContentPlan;
use longform_core::generation::{GenerationService, GenerationUsage};
use longform_core::job::{generating_step, GenerationParams, Job, JobUpdate};
use longform_core::store::{bounded, JobStore};

use crate::error::OrchestrationError;
use crate::prompts::{self, ChunkPrompt, CONTINUITY_TAIL_CHARS};

/// Per-chunk metadata stored alongside the script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkSummary {
    pub chunk_number: u32,
    pub word_count: usize,
    pub start_minute: f64,
    pub end_minute: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<GenerationUsage> for UsageTotals {
    fn from(usage: GenerationUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens(),
        }
    }
}

/// A finished script, serialized into `jobs.result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptResult {
    pub script: String,
    pub word_count: usize,
    pub chunk_count: usize,
    pub chunks: Vec<ChunkSummary>,
    pub usage: UsageTotals,
}

impl ScriptResult {
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

pub struct GenerationOrchestrator {
    service: Arc<dyn GenerationService>,
    store: Arc<dyn JobStore>,
    store_timeout: Duration,
}

impl GenerationOrchestrator {
    pub fn new(
        service: Arc<dyn GenerationService>,
        store: Arc<dyn JobStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            service,
            store,
            store_timeout,
        }
    }

    /// Generate the whole script for `job`, stopping at `deadline`.
    ///
    /// Every attempt starts at chunk 1.
    pub async fn run(&self, job: &Job, deadline: Instant) -> Result<ScriptResult, OrchestrationError> {
        let params = GenerationParams::from_job(job)
            .map_err(|e| OrchestrationError::InvalidPlan(format!("unreadable generation params: {e}")))?;
        let plan = &params.content_plan;
        if plan.is_empty() {
            return Err(OrchestrationError::InvalidPlan("content plan has no chunks".into()));
        }
        let total = plan.len();

        bounded(
            self.store_timeout,
            self.store.update(job.id, JobUpdate {
                current_step: Some(generating_step(1, total)),
                ..Default::default()
            }),
        )
        .await?;

        let mut texts: Vec<String> = Vec::with_capacity(total);
        let mut chunks = Vec::with_capacity(total);
        let mut usage = GenerationUsage::default();

        for (index, assignment) in plan.chunks.iter().enumerate() {
            let chunk = index + 1;
            if Instant::now() >= deadline {
                return Err(OrchestrationError::BudgetExhausted { chunk });
            }

            let text = self
                .generate_chunk(&params, plan, index, texts.last().map(String::as_str), deadline)
                .await
                .map(|(text, chunk_usage)| {
                    usage.add(chunk_usage);
                    text
                })?;

            let word_count = text.split_whitespace().count();
            chunks.push(ChunkSummary {
                chunk_number: assignment.chunk_number,
                word_count,
                start_minute: assignment.time_range.start_minute,
                end_minute: assignment.time_range.end_minute,
            });
            texts.push(text);

            bounded(
                self.store_timeout,
                self.store.update(job.id, JobUpdate::chunk_finished(index, total)),
            )
            .await?;

            tracing::info!(job_id = job.id, chunk, total, words = word_count, "Chunk generated");
        }

        let script = texts.join("\n\n");
        Ok(ScriptResult {
            word_count: script.split_whitespace().count(),
            script,
            chunk_count: total,
            chunks,
            usage: usage.into(),
        })
    }

    async fn generate_chunk(
        &self,
        params: &GenerationParams,
        plan: &ContentPlan,
        index: usize,
        previous: Option<&str>,
        deadline: Instant,
    ) -> Result<(String, GenerationUsage), OrchestrationError> {
        let chunk = index + 1;
        let forbidden = plan.forbidden_titles(index);
        let request = prompts::chunk_request(&ChunkPrompt {
            params,
            chunk: &plan.chunks[index],
            total_chunks: plan.len(),
            forbidden_titles: &forbidden,
            previous_tail: previous.map_or("", |text| prompts::tail(text, CONTINUITY_TAIL_CHARS)),
        });

        match tokio::time::timeout_at(deadline, self.service.generate(request)).await {
            Err(_) => Err(OrchestrationError::BudgetExhausted { chunk }),
            Ok(Err(source)) => Err(OrchestrationError::Generation { chunk, source }),
            Ok(Ok(output)) => Ok((output.text.trim().to_string(), output.usage)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use longform_core::chunk_plan::{fallback_plan, ContentPoint};
    use longform_core::generation::{GenerationError, GenerationOutput, GenerationRequest};
    use longform_core::job::{JobStatus, NewJob, STEP_FINALIZING};
    use longform_core::store::MemoryJobStore;

    use super::*;
    use crate::testing::ScriptedService;

    fn points(n: usize) -> Vec<ContentPoint> {
        (1..=n)
            .map(|i| ContentPoint {
                title: format!("Section {i}"),
                description: String::new(),
                duration_minutes: None,
            })
            .collect()
    }

    async fn claimed_job(store: &MemoryJobStore, plan: ContentPlan) -> Job {
        let params = GenerationParams {
            title: "Deep Sea".into(),
            target_minutes: 45,
            content_plan: plan.clone(),
            ..Default::default()
        };
        store
            .create(NewJob {
                parent_request_id: 7,
                owner_id: 1,
                total_chunks: plan.len() as i32,
                generation_params: params.to_value().unwrap(),
                priority: 0,
                max_retries: 3,
            })
            .await
            .unwrap();
        store.claim_next().await.unwrap().unwrap()
    }

    fn orchestrator(
        service: Arc<dyn GenerationService>,
        store: Arc<MemoryJobStore>,
    ) -> GenerationOrchestrator {
        GenerationOrchestrator::new(service, store, Duration::from_secs(5))
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[tokio::test]
    async fn chunks_are_joined_and_progress_persisted() {
        let store = Arc::new(MemoryJobStore::new());
        let job = claimed_job(&store, fallback_plan(&points(4), 45.0, 4)).await;
        let service = Arc::new(ScriptedService::new(vec![
            Ok("One two three.".into()),
            Ok("Four five.".into()),
            Ok("Six.".into()),
            Ok(" Seven eight. ".into()),
        ]));

        let result = orchestrator(service.clone(), store.clone())
            .run(&job, far_deadline())
            .await
            .unwrap();

        assert_eq!(result.script, "One two three.\n\nFour five.\n\nSix.\n\nSeven eight.");
        assert_eq!(result.word_count, 8);
        assert_eq!(result.chunk_count, 4);
        assert_eq!(result.chunks[3].chunk_number, 4);
        assert_eq!(result.chunks[3].end_minute, 45.0);
        assert_eq!(result.usage.prompt_tokens, 40);

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 100);
        assert_eq!(stored.current_chunk, 4);
        assert_eq!(stored.current_step, STEP_FINALIZING);
        assert_eq!(stored.status, JobStatus::Processing);

        let requests = service.requests();
        assert!(requests[0].user_prompt.contains("- Section 2"));
        assert!(requests[1].user_prompt.contains("One two three."));
        assert!(!requests[0].user_prompt.contains("previous part ended"));
    }

    #[tokio::test]
    async fn failed_chunk_keeps_earlier_progress_and_reports_chunk() {
        let store = Arc::new(MemoryJobStore::new());
        let job = claimed_job(&store, fallback_plan(&points(3), 35.0, 3)).await;
        let service = Arc::new(ScriptedService::new(vec![
            Ok("Opening.".into()),
            Err(GenerationError::Server {
                status: 503,
                body: "overloaded".into(),
            }),
        ]));

        let err = orchestrator(service, store.clone())
            .run(&job, far_deadline())
            .await
            .unwrap_err();

        assert_matches!(err, OrchestrationError::Generation { chunk: 2, .. });
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.current_chunk, 1);
        assert_eq!(stored.progress, 33);
        assert!(stored.result.is_none());
    }

    #[tokio::test]
    async fn empty_plan_is_fatal() {
        let store = Arc::new(MemoryJobStore::new());
        let job = claimed_job(&store, ContentPlan::default()).await;

        let err = orchestrator(Arc::new(ScriptedService::always("x")), store)
            .run(&job, far_deadline())
            .await
            .unwrap_err();

        assert_matches!(err, OrchestrationError::InvalidPlan(_));
    }

    struct SlowService;

    #[async_trait]
    impl GenerationService for SlowService {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationOutput, GenerationError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(GenerationOutput {
                text: "late".into(),
                usage: GenerationUsage::default(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_a_slow_call_short() {
        let store = Arc::new(MemoryJobStore::new());
        let job = claimed_job(&store, fallback_plan(&points(3), 35.0, 3)).await;

        let err = orchestrator(Arc::new(SlowService), store)
            .run(&job, Instant::now() + Duration::from_secs(60))
            .await
            .unwrap_err();

        assert_matches!(err, OrchestrationError::BudgetExhausted { chunk: 1 });
    }

    #[tokio::test]
    async fn store_failure_aborts_the_attempt() {
        let store = Arc::new(MemoryJobStore::new());
        let job = claimed_job(&store, fallback_plan(&points(3), 35.0, 3)).await;
        store.fail_next_update();

        let err = orchestrator(Arc::new(ScriptedService::always("text")), store)
            .run(&job, far_deadline())
            .await
            .unwrap_err();

        assert_matches!(err, OrchestrationError::Store(_));
    }

    #[tokio::test]
    async fn continuity_tail_is_bounded() {
        let store = Arc::new(MemoryJobStore::new());
        let job = claimed_job(&store, fallback_plan(&points(2), 35.0, 3)).await;
        let long = "word ".repeat(500);
        let service = Arc::new(ScriptedService::new(vec![Ok(long), Ok("end".into())]));

        orchestrator(service.clone(), store)
            .run(&job, far_deadline())
            .await
            .unwrap();

        let second = &service.requests()[1].user_prompt;
        let block = second.split("\"\"\"").nth(1).unwrap();
        assert!(block.trim().chars().count() <= CONTINUITY_TAIL_CHARS);
    }
}
