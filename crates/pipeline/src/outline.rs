//! Outline drafting through the generation service.

use std::sync::Arc;

use longform_core::chunk_plan::{dedupe_points, ChunkBrackets, ContentPoint};
use longform_core::generation::{GenerationError, GenerationService};
use longform_core::outline::{content_points_from_outline, OutlineData, OutlineSection};

use crate::json::extract_json_object;
use crate::prompts;

/// What the outline prompt is built from.
#[derive(Debug, Clone, Default)]
pub struct OutlineInput {
    pub title: String,
    pub topic: String,
    pub total_minutes: u32,
    pub content_points: Vec<ContentPoint>,
    /// One line per selected research source.
    pub research_notes: Vec<String>,
    /// Feedback left on the outline this one replaces.
    pub feedback: Option<String>,
}

/// A generated outline ready to be stored as `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineDraft {
    pub data: serde_json::Value,
    /// Top-level sections as content points for chunk planning.
    pub content_points: Vec<ContentPoint>,
    pub chunk_count: u32,
}

pub struct OutlineGenerator {
    service: Arc<dyn GenerationService>,
    brackets: ChunkBrackets,
}

impl OutlineGenerator {
    pub fn new(service: Arc<dyn GenerationService>, brackets: ChunkBrackets) -> Self {
        Self { service, brackets }
    }

    /// Ask the service for an outline.
    ///
    /// An unparseable answer is replaced by an outline built from the
    /// caller's content points. Without content points there is nothing to
    /// fall back to and the answer is rejected.
    pub async fn generate(&self, input: &OutlineInput) -> Result<OutlineDraft, GenerationError> {
        let chunk_count = self.brackets.chunk_count(input.total_minutes);
        let points = dedupe_points(&input.content_points);

        let request = prompts::outline_request(
            &input.title,
            &input.topic,
            input.total_minutes,
            chunk_count,
            &points,
            &input.research_notes,
            input.feedback.as_deref(),
        );
        let output = self.service.generate(request).await?;

        let data = match parse_outline(&output.text) {
            Ok(data) => data,
            Err(reason) if !points.is_empty() => {
                tracing::warn!(
                    title = %input.title,
                    reason = %reason,
                    "Outline response unusable, building outline from content points",
                );
                outline_from_points(&input.title, &points, input.total_minutes)?
            }
            Err(reason) => return Err(GenerationError::InvalidResponse(reason)),
        };

        Ok(OutlineDraft {
            content_points: content_points_from_outline(&data),
            data,
            chunk_count,
        })
    }
}

/// Parse and sanity-check the service's outline. The raw JSON is kept so
/// extra fields the model adds survive into storage.
fn parse_outline(text: &str) -> Result<serde_json::Value, String> {
    let json = extract_json_object(text).ok_or("no JSON object in outline response")?;
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let outline: OutlineData = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    if outline.sections.is_empty() {
        return Err("outline has no sections".into());
    }
    if outline.sections.iter().any(|s| s.title.trim().is_empty()) {
        return Err("outline has an untitled section".into());
    }
    Ok(value)
}

fn outline_from_points(
    title: &str,
    points: &[ContentPoint],
    total_minutes: u32,
) -> Result<serde_json::Value, GenerationError> {
    let even_share = f64::from(total_minutes) / points.len() as f64;
    let outline = OutlineData {
        title: title.to_string(),
        sections: points
            .iter()
            .map(|p| OutlineSection {
                title: p.title.clone(),
                description: p.description.clone(),
                estimated_minutes: Some(p.duration_minutes.unwrap_or(even_share)),
                subsections: Vec::new(),
            })
            .collect(),
    };
    serde_json::to_value(outline).map_err(|e| GenerationError::InvalidResponse(e.to_string()))
}
