//! Script request rows and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use longform_core::outline::ApprovalSnapshot;
use longform_core::types::{DbId, Timestamp};

/// A row from the `script_requests` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScriptRequest {
    pub id: DbId,
    pub owner_id: DbId,
    pub title: String,
    pub topic: String,
    pub target_minutes: i32,
    /// JSON array of completed step names.
    pub completed_steps: serde_json::Value,
    /// [`ApprovalSnapshot`] of the approved outline, if any.
    pub approved_outline: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScriptRequest {
    pub fn has_completed_step(&self, step: &str) -> bool {
        self.completed_steps
            .as_array()
            .is_some_and(|steps| steps.iter().any(|s| s.as_str() == Some(step)))
    }

    /// The approved outline reference, if one was recorded and parses.
    pub fn approval(&self) -> Option<ApprovalSnapshot> {
        self.approved_outline
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Body of `POST /api/v1/script-requests`.
#[derive(Debug, Deserialize)]
pub struct CreateScriptRequest {
    pub title: String,
    #[serde(default)]
    pub topic: String,
    pub target_minutes: i32,
}
