//! Research source rows and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use longform_core::research::ResearchSource;
use longform_core::types::{DbId, Timestamp};

/// A row from the `research_sources` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResearchSourceRow {
    pub id: DbId,
    pub script_request_id: DbId,
    pub source_type: String,
    pub title: String,
    pub url: Option<String>,
    pub word_count: i32,
    pub quality_score: f64,
    pub is_selected: bool,
    pub is_user_document: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&ResearchSourceRow> for ResearchSource {
    fn from(row: &ResearchSourceRow) -> Self {
        ResearchSource {
            source_type: row.source_type.clone(),
            word_count: row.word_count,
            quality_score: row.quality_score,
            is_selected: row.is_selected,
        }
    }
}

/// Body of `POST /api/v1/script-requests/{id}/sources`.
#[derive(Debug, Deserialize)]
pub struct CreateResearchSource {
    pub source_type: String,
    pub title: String,
    pub url: Option<String>,
    pub word_count: i32,
    pub quality_score: Option<f64>,
    pub is_selected: Option<bool>,
    pub is_user_document: Option<bool>,
}
