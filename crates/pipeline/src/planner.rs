//! Chunk distribution: ask the generation service for a plan, fall back to
//! a contiguous partition when the answer is unusable.

use std::sync::Arc;

use longform_core::chunk_plan::{
    dedupe_points, fallback_plan, parse_plan_response, ChunkBrackets, ContentPlan, ContentPoint,
    PlanError,
};
use longform_core::generation::GenerationService;

use crate::json::extract_json_object;
use crate::prompts;

/// Where a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Service,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedContent {
    pub plan: ContentPlan,
    pub chunk_count: u32,
    pub source: PlanSource,
}

pub struct ChunkPlanner {
    service: Arc<dyn GenerationService>,
    brackets: ChunkBrackets,
}

impl ChunkPlanner {
    pub fn new(service: Arc<dyn GenerationService>, brackets: ChunkBrackets) -> Self {
        Self { service, brackets }
    }

    pub fn chunk_count(&self, total_minutes: u32) -> u32 {
        self.brackets.chunk_count(total_minutes)
    }

    /// Partition `points` across the chunk count for `total_minutes`.
    ///
    /// Never fails: any service or validation problem degrades to
    /// [`fallback_plan`], which is a valid partition by construction.
    pub async fn plan(&self, points: &[ContentPoint], total_minutes: u32) -> PlannedContent {
        let chunk_count = self.chunk_count(total_minutes);
        let minutes = f64::from(total_minutes);
        let points = dedupe_points(points);

        if points.is_empty() {
            return PlannedContent {
                plan: fallback_plan(&points, minutes, chunk_count),
                chunk_count,
                source: PlanSource::Fallback,
            };
        }

        match self.request_plan(&points, minutes, chunk_count).await {
            Ok(plan) => {
                tracing::debug!(chunk_count, points = points.len(), "Using service chunk plan");
                PlannedContent {
                    plan,
                    chunk_count,
                    source: PlanSource::Service,
                }
            }
            Err(reason) => {
                tracing::warn!(chunk_count, reason = %reason, "Chunk plan rejected, using fallback");
                PlannedContent {
                    plan: fallback_plan(&points, minutes, chunk_count),
                    chunk_count,
                    source: PlanSource::Fallback,
                }
            }
        }
    }

    async fn request_plan(
        &self,
        points: &[ContentPoint],
        total_minutes: f64,
        chunk_count: u32,
    ) -> Result<ContentPlan, String> {
        let request = prompts::plan_request(points, total_minutes, chunk_count);
        let output = self
            .service
            .generate(request)
            .await
            .map_err(|e| e.to_string())?;
        let json = extract_json_object(&output.text)
            .ok_or_else(|| PlanError::Parse("no JSON object in response".into()).to_string())?;
        parse_plan_response(json, points, total_minutes, chunk_count as usize)
            .map_err(|e| e.to_string())
    }
}
