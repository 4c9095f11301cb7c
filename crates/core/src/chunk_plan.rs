//! Content planning: partitioning content points across bounded chunks.
//!
//! A [`ContentPlan`] assigns every input content point to exactly one
//! chunk. Plans come from two places:
//!
//! - the generation service (see `longform_pipeline::planner`), whose raw
//!   response is bound back to the inputs by [`parse_plan_response`] and
//!   checked by [`validate_plan`];
//! - [`fallback_plan`], a contiguous partition in input order that is
//!   correct by construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One topic the script must cover, as supplied by the caller or outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPoint {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
}

/// A content point as placed in a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub description: String,
    pub estimated_minutes: f64,
}

/// Minute offsets covered by a chunk, `[start_minute, end_minute)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_minute: f64,
    pub end_minute: f64,
}

impl TimeRange {
    pub fn minutes(&self) -> f64 {
        self.end_minute - self.start_minute
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAssignment {
    /// 1-based position of the chunk in the script.
    pub chunk_number: u32,
    pub time_range: TimeRange,
    pub assigned_sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentPlan {
    pub chunks: Vec<ChunkAssignment>,
}

impl ContentPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Titles assigned to every chunk except `chunk_index` (0-based).
    ///
    /// Passed to the generation service so a chunk does not re-cover
    /// material that belongs elsewhere.
    pub fn forbidden_titles(&self, chunk_index: usize) -> Vec<String> {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != chunk_index)
            .flat_map(|(_, chunk)| chunk.assigned_sections.iter().map(|s| s.title.clone()))
            .collect()
    }

    /// Build a plan from grouped sections, deriving time ranges.
    ///
    /// Each chunk's range is proportional to the estimated minutes of its
    /// sections. When no chunk carries any minutes (e.g. there are no
    /// content points) the total is divided evenly.
    pub fn from_groups(groups: Vec<Vec<Section>>, total_minutes: f64) -> Self {
        let count = groups.len();
        let weights: Vec<f64> = groups
            .iter()
            .map(|g| g.iter().map(|s| s.estimated_minutes.max(0.0)).sum())
            .collect();
        let weight_total: f64 = weights.iter().sum();

        let mut start = 0.0;
        let chunks = groups
            .into_iter()
            .enumerate()
            .map(|(i, sections)| {
                let span = if weight_total > 0.0 {
                    total_minutes * weights[i] / weight_total
                } else {
                    total_minutes / count as f64
                };
                let end = if i + 1 == count { total_minutes } else { start + span };
                let chunk = ChunkAssignment {
                    chunk_number: (i + 1) as u32,
                    time_range: TimeRange {
                        start_minute: start,
                        end_minute: end,
                    },
                    assigned_sections: sections,
                };
                start = end;
                chunk
            })
            .collect();

        Self { chunks }
    }
}

// ---------------------------------------------------------------------------
// Chunk count brackets
// ---------------------------------------------------------------------------

/// Maps total minutes to a chunk count.
///
/// Brackets are checked in ascending `max_minutes` order; the first bracket
/// whose `max_minutes` is at least the requested total wins, otherwise
/// `default_chunks` applies.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkBrackets {
    brackets: Vec<(u32, u32)>,
    default_chunks: u32,
}

impl Default for ChunkBrackets {
    fn default() -> Self {
        Self {
            brackets: vec![(40, 3), (50, 4)],
            default_chunks: 5,
        }
    }
}

impl ChunkBrackets {
    /// Build from explicit `(max_minutes, chunk_count)` pairs.
    pub fn new(mut brackets: Vec<(u32, u32)>, default_chunks: u32) -> Result<Self, CoreError> {
        if default_chunks == 0 || brackets.iter().any(|(_, chunks)| *chunks == 0) {
            return Err(CoreError::Validation(
                "Chunk brackets must produce at least one chunk".into(),
            ));
        }
        brackets.sort_by_key(|(max, _)| *max);
        Ok(Self {
            brackets,
            default_chunks,
        })
    }

    /// Parse the `CHUNK_BRACKETS` format: `"40:3,50:4,*:5"`.
    ///
    /// `*` sets the count used above the last bracket.
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        let mut brackets = Vec::new();
        let mut default_chunks = None;

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (max, chunks) = entry.split_once(':').ok_or_else(|| {
                CoreError::Validation(format!("Invalid chunk bracket '{entry}', expected max:count"))
            })?;
            let chunks: u32 = chunks.trim().parse().map_err(|_| {
                CoreError::Validation(format!("Invalid chunk count in bracket '{entry}'"))
            })?;
            if max.trim() == "*" {
                default_chunks = Some(chunks);
            } else {
                let max: u32 = max.trim().parse().map_err(|_| {
                    CoreError::Validation(format!("Invalid minute bound in bracket '{entry}'"))
                })?;
                brackets.push((max, chunks));
            }
        }

        let default_chunks = default_chunks.ok_or_else(|| {
            CoreError::Validation("Chunk brackets need a '*:count' catch-all entry".into())
        })?;
        Self::new(brackets, default_chunks)
    }

    /// Load from `CHUNK_BRACKETS`, falling back to the default table.
    ///
    /// # Panics
    ///
    /// Panics if the variable is set but malformed.
    pub fn from_env() -> Self {
        match std::env::var("CHUNK_BRACKETS") {
            Ok(spec) => Self::parse(&spec).expect("CHUNK_BRACKETS must be a valid bracket table"),
            Err(_) => Self::default(),
        }
    }

    pub fn chunk_count(&self, total_minutes: u32) -> u32 {
        self.brackets
            .iter()
            .find(|(max, _)| total_minutes <= *max)
            .map(|(_, chunks)| *chunks)
            .unwrap_or(self.default_chunks)
    }
}

// ---------------------------------------------------------------------------
// Fallback partition
// ---------------------------------------------------------------------------

/// Estimated minutes for a point: its own duration, else an even share.
fn section_from_point(point: &ContentPoint, even_share: f64) -> Section {
    Section {
        title: point.title.clone(),
        description: point.description.clone(),
        estimated_minutes: point.duration_minutes.unwrap_or(even_share),
    }
}

/// Partition `points` into contiguous groups of `ceil(points / chunk_count)`
/// in input order.
///
/// With no points, produces `chunk_count` chunks with empty section lists
/// and evenly divided time ranges. The result may have fewer than
/// `chunk_count` chunks when the points do not fill every group.
pub fn fallback_plan(points: &[ContentPoint], total_minutes: f64, chunk_count: u32) -> ContentPlan {
    let chunk_count = chunk_count.max(1) as usize;

    if points.is_empty() {
        return ContentPlan::from_groups(vec![Vec::new(); chunk_count], total_minutes);
    }

    let even_share = total_minutes / points.len() as f64;
    let group_size = points.len().div_ceil(chunk_count);
    let groups = points
        .chunks(group_size)
        .map(|group| group.iter().map(|p| section_from_point(p, even_share)).collect())
        .collect();

    ContentPlan::from_groups(groups, total_minutes)
}

/// Drop untitled points and repeated titles (case-insensitive, trimmed),
/// keeping the first occurrence. Planning assumes unique titles.
pub fn dedupe_points(points: &[ContentPoint]) -> Vec<ContentPoint> {
    let mut seen = std::collections::HashSet::new();
    points
        .iter()
        .filter(|p| !p.title.trim().is_empty() && seen.insert(title_key(&p.title)))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Why a proposed plan was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("Plan response could not be parsed: {0}")]
    Parse(String),

    #[error("Plan has no chunks")]
    MissingChunks,

    #[error("Plan has {actual} chunks, expected {expected}")]
    ChunkCountMismatch { expected: usize, actual: usize },

    #[error("Section '{0}' is assigned to more than one chunk")]
    DuplicateSection(String),

    #[error("Section '{0}' is not assigned to any chunk")]
    MissingSection(String),

    #[error("Section '{0}' does not match any content point")]
    UnknownSection(String),
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Check that `plan` covers every point in `points` exactly once.
///
/// When `expected_chunks` is `Some`, the chunk count must also match.
pub fn validate_plan(
    plan: &ContentPlan,
    points: &[ContentPoint],
    expected_chunks: Option<usize>,
) -> Result<(), PlanError> {
    if plan.chunks.is_empty() {
        return Err(PlanError::MissingChunks);
    }
    if let Some(expected) = expected_chunks {
        if plan.chunks.len() != expected {
            return Err(PlanError::ChunkCountMismatch {
                expected,
                actual: plan.chunks.len(),
            });
        }
    }

    let mut seen: HashMap<String, usize> = points.iter().map(|p| (title_key(&p.title), 0)).collect();

    for section in plan.chunks.iter().flat_map(|c| &c.assigned_sections) {
        match seen.get_mut(&title_key(&section.title)) {
            None => return Err(PlanError::UnknownSection(section.title.clone())),
            Some(count) if *count > 0 => {
                return Err(PlanError::DuplicateSection(section.title.clone()))
            }
            Some(count) => *count += 1,
        }
    }

    if let Some(missing) = points.iter().find(|p| seen[&title_key(&p.title)] == 0) {
        return Err(PlanError::MissingSection(missing.title.clone()));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Service response binding
// ---------------------------------------------------------------------------

/// Shape requested from the generation service.
#[derive(Debug, Deserialize)]
struct RawPlan {
    chunks: Vec<RawChunk>,
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    #[serde(default)]
    sections: Vec<String>,
}

/// Parse a plan JSON document (`{"chunks": [{"sections": ["title", ...]}]}`)
/// and bind its titles back to the input points.
///
/// Descriptions and durations always come from the inputs, never from the
/// service. The bound plan is validated before it is returned.
pub fn parse_plan_response(
    json: &str,
    points: &[ContentPoint],
    total_minutes: f64,
    expected_chunks: usize,
) -> Result<ContentPlan, PlanError> {
    let raw: RawPlan = serde_json::from_str(json).map_err(|e| PlanError::Parse(e.to_string()))?;
    if raw.chunks.is_empty() {
        return Err(PlanError::MissingChunks);
    }

    let even_share = if points.is_empty() {
        0.0
    } else {
        total_minutes / points.len() as f64
    };
    let by_title: HashMap<String, &ContentPoint> =
        points.iter().map(|p| (title_key(&p.title), p)).collect();

    let groups = raw
        .chunks
        .iter()
        .map(|chunk| {
            chunk
                .sections
                .iter()
                .map(|title| {
                    by_title
                        .get(&title_key(title))
                        .map(|p| section_from_point(p, even_share))
                        .ok_or_else(|| PlanError::UnknownSection(title.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let plan = ContentPlan::from_groups(groups, total_minutes);
    validate_plan(&plan, points, Some(expected_chunks))?;
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
