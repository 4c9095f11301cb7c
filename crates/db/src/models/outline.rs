//! Outline rows and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use longform_core::chunk_plan::ContentPoint;
use longform_core::outline::OutlineStatus;
use longform_core::status::StatusId;
use longform_core::types::{DbId, Timestamp};

use super::status::decode_outline_status;

/// A row from the `outlines` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Outline {
    pub id: DbId,
    pub parent_request_id: DbId,
    pub title: String,
    pub total_minutes: i32,
    pub chunk_count: i32,
    pub outline_data: serde_json::Value,
    pub status_id: StatusId,
    pub research_score: f64,
    pub user_feedback: Option<String>,
    pub approved_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Outline {
    pub fn status(&self) -> Result<OutlineStatus, sqlx::Error> {
        decode_outline_status(self.status_id)
    }
}

/// Insert payload for a freshly generated outline.
#[derive(Debug, Clone)]
pub struct NewOutline {
    pub parent_request_id: DbId,
    pub title: String,
    pub total_minutes: i32,
    pub chunk_count: i32,
    pub outline_data: serde_json::Value,
    pub research_score: f64,
}

/// Body of `POST /api/v1/script-requests/{id}/outline`.
#[derive(Debug, Deserialize)]
pub struct GenerateOutline {
    pub total_minutes: u32,
    /// Points the outline must cover; the generator may add more.
    pub content_points: Option<Vec<ContentPoint>>,
}

/// Body of `POST /api/v1/outlines/review`.
#[derive(Debug, Deserialize)]
pub struct ReviewOutline {
    pub outline_id: DbId,
    /// `"approved"` or `"rejected"`.
    pub status: String,
    pub feedback: Option<String>,
    /// Partial outline document merged into `outline_data` on approval.
    pub edits: Option<serde_json::Value>,
}

/// Body of `PUT /api/v1/outlines/regenerate`.
#[derive(Debug, Deserialize)]
pub struct RegenerateOutline {
    pub outline_id: DbId,
    pub feedback: Option<String>,
}
