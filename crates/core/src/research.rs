//! Research sufficiency scoring and the adequacy gate for outline generation.
//!
//! Minimums are policy data, not hard contracts: [`ResearchPolicy`] carries
//! the duration brackets and scoring targets and can be swapped per
//! deployment. Both [`ResearchPolicy::score`] and
//! [`ResearchPolicy::is_adequate`] are pure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Metadata of one research source attached to a script request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSource {
    pub source_type: String,
    pub word_count: i32,
    /// Quality in `0.0..=1.0`. Out-of-range values are clamped.
    pub quality_score: f64,
    pub is_selected: bool,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceTypeBreakdown {
    pub sources: usize,
    pub words: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchScore {
    /// Normalized sufficiency in `0.0..=1.0`.
    pub overall_score: f64,
    pub total_words: i64,
    pub source_count: usize,
    pub average_quality: f64,
    /// Per `source_type`; ordered so serialized output is stable.
    pub breakdown: BTreeMap<String, SourceTypeBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdequacyReport {
    pub is_adequate: bool,
    pub recommendations: Vec<String>,
    pub required_words: i64,
    pub required_sources: usize,
    pub score: ResearchScore,
}

impl AdequacyReport {
    /// Turn an inadequate report into the boundary error surfaced to callers.
    pub fn into_result(self) -> Result<Self, CoreError> {
        if self.is_adequate {
            Ok(self)
        } else {
            Err(CoreError::InsufficientResearch {
                recommendations: self.recommendations,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Minimums for scripts up to `max_minutes` long (`None` = any length).
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchBracket {
    pub max_minutes: Option<u32>,
    pub min_words: i64,
    pub min_sources: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchPolicy {
    /// Checked in order; the first bracket that fits the duration applies.
    pub brackets: Vec<ResearchBracket>,
    /// Word count at which the word component of the score saturates.
    pub word_target: i64,
    /// Source count at which the source component of the score saturates.
    pub source_target: usize,
    /// Overall score below which research is inadequate regardless of counts.
    pub min_overall_score: f64,
}

const WEIGHT_WORDS: f64 = 0.4;
const WEIGHT_SOURCES: f64 = 0.3;
const WEIGHT_QUALITY: f64 = 0.3;

impl Default for ResearchPolicy {
    fn default() -> Self {
        Self {
            brackets: vec![
                ResearchBracket {
                    max_minutes: Some(30),
                    min_words: 1000,
                    min_sources: 2,
                },
                ResearchBracket {
                    max_minutes: Some(45),
                    min_words: 2000,
                    min_sources: 3,
                },
                ResearchBracket {
                    max_minutes: Some(60),
                    min_words: 3000,
                    min_sources: 4,
                },
                ResearchBracket {
                    max_minutes: None,
                    min_words: 4500,
                    min_sources: 5,
                },
            ],
            word_target: 5000,
            source_target: 5,
            min_overall_score: 0.3,
        }
    }
}

impl ResearchPolicy {
    fn bracket_for(&self, total_minutes: u32) -> Option<&ResearchBracket> {
        self.brackets
            .iter()
            .find(|b| b.max_minutes.map_or(true, |max| total_minutes <= max))
    }

    /// Aggregate selected sources into a normalized score.
    pub fn score(&self, sources: &[ResearchSource]) -> ResearchScore {
        let selected: Vec<&ResearchSource> = sources.iter().filter(|s| s.is_selected).collect();

        let mut breakdown: BTreeMap<String, SourceTypeBreakdown> = BTreeMap::new();
        let mut total_words: i64 = 0;
        let mut quality_sum = 0.0;

        for source in &selected {
            let words = i64::from(source.word_count.max(0));
            total_words += words;
            quality_sum += source.quality_score.clamp(0.0, 1.0);

            let entry = breakdown.entry(source.source_type.clone()).or_default();
            entry.sources += 1;
            entry.words += words;
        }

        let source_count = selected.len();
        let average_quality = if source_count == 0 {
            0.0
        } else {
            quality_sum / source_count as f64
        };

        let word_component = if self.word_target > 0 {
            (total_words as f64 / self.word_target as f64).min(1.0)
        } else {
            1.0
        };
        let source_component = if self.source_target > 0 {
            (source_count as f64 / self.source_target as f64).min(1.0)
        } else {
            1.0
        };

        let overall_score = (WEIGHT_WORDS * word_component
            + WEIGHT_SOURCES * source_component
            + WEIGHT_QUALITY * average_quality)
            .clamp(0.0, 1.0);

        ResearchScore {
            overall_score,
            total_words,
            source_count,
            average_quality,
            breakdown,
        }
    }

    /// Apply the duration bracket to `sources`.
    ///
    /// User-supplied documents halve both minimums (rounded up). Every
    /// failing criterion contributes one recommendation.
    pub fn is_adequate(
        &self,
        sources: &[ResearchSource],
        total_minutes: u32,
        has_user_documents: bool,
    ) -> AdequacyReport {
        let score = self.score(sources);

        let (mut required_words, mut required_sources) = self
            .bracket_for(total_minutes)
            .map(|b| (b.min_words, b.min_sources))
            .unwrap_or((0, 0));
        if has_user_documents {
            required_words = (required_words + 1) / 2;
            required_sources = required_sources.div_ceil(2);
        }

        let mut recommendations = Vec::new();

        if score.total_words < required_words {
            recommendations.push(format!(
                "Add at least {} more words of research ({} of {} required for a {}-minute script)",
                required_words - score.total_words,
                score.total_words,
                required_words,
                total_minutes,
            ));
        }
        if score.source_count < required_sources {
            recommendations.push(format!(
                "Select at least {} more source(s) ({} of {} required)",
                required_sources - score.source_count,
                score.source_count,
                required_sources,
            ));
        }
        if score.overall_score < self.min_overall_score {
            recommendations.push(format!(
                "Improve source quality or coverage: research score {:.2} is below {:.2}",
                score.overall_score, self.min_overall_score,
            ));
        }
        if !recommendations.is_empty() && !has_user_documents {
            recommendations
                .push("Upload your own documents to lower the research requirements".to_string());
        }

        AdequacyReport {
            is_adequate: recommendations.is_empty(),
            recommendations,
            required_words,
            required_sources,
            score,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
