//! Outline approval state machine and outline-data helpers.
//!
//! ```text
//! pending --approve-->    approved      (terminal)
//!         --reject-->     rejected      (terminal)
//!         --regenerate--> regenerating  (superseded by a new pending outline)
//! ```
//!
//! Every transition is owner-only and starts from `pending`.

use serde::{Deserialize, Serialize};

use crate::chunk_plan::ContentPoint;
use crate::define_status_enum;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

define_status_enum! {
    /// Outline review status.
    OutlineStatus {
        Pending = 1 => "pending",
        Approved = 2 => "approved",
        Rejected = 3 => "rejected",
        Regenerating = 4 => "regenerating",
    }
}

/// Step recorded on the parent request when its outline is approved.
pub const STEP_OUTLINE_APPROVED: &str = "outline_approved";

/// Scripts at least this long need an outline (and an approved one before
/// full generation).
pub const MIN_OUTLINE_MINUTES: u32 = 30;

/// Review decision values accepted by `POST /outlines/review`.
pub const DECISION_APPROVED: &str = "approved";
pub const DECISION_REJECTED: &str = "rejected";

/// A caller-initiated outline transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineAction {
    Approve,
    Reject,
    Regenerate,
}

impl OutlineAction {
    /// Parse a review decision (`"approved"` / `"rejected"`).
    pub fn from_review_status(status: &str) -> Result<Self, CoreError> {
        match status {
            DECISION_APPROVED => Ok(Self::Approve),
            DECISION_REJECTED => Ok(Self::Reject),
            other => Err(CoreError::Validation(format!(
                "Invalid review status '{other}'. Must be one of: {DECISION_APPROVED}, {DECISION_REJECTED}"
            ))),
        }
    }

    pub fn target(self) -> OutlineStatus {
        match self {
            Self::Approve => OutlineStatus::Approved,
            Self::Reject => OutlineStatus::Rejected,
            Self::Regenerate => OutlineStatus::Regenerating,
        }
    }
}

/// Validate a transition and return the resulting status.
pub fn transition(current: OutlineStatus, action: OutlineAction) -> Result<OutlineStatus, CoreError> {
    if current != OutlineStatus::Pending {
        return Err(CoreError::Conflict(format!(
            "Outline is already {current} and cannot be {}",
            action.target()
        )));
    }
    Ok(action.target())
}

/// Reject callers who do not own the parent request.
pub fn ensure_owner(owner_id: DbId, caller_id: DbId) -> Result<(), CoreError> {
    if owner_id != caller_id {
        return Err(CoreError::Forbidden(
            "Only the owner of the script request can change its outline".into(),
        ));
    }
    Ok(())
}

/// Require a duration long enough to warrant an outline.
pub fn validate_outline_minutes(total_minutes: u32) -> Result<(), CoreError> {
    if total_minutes < MIN_OUTLINE_MINUTES {
        return Err(CoreError::Validation(format!(
            "Outlines are only generated for scripts of at least {MIN_OUTLINE_MINUTES} minutes"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

/// Merge reviewer edits into outline data.
///
/// Returns `Ok(None)` when there is nothing to apply (no edits, or an empty
/// object) so callers can leave the stored document untouched. Objects
/// merge recursively; any other edited value replaces the stored one.
pub fn merge_edits(
    data: &serde_json::Value,
    edits: Option<&serde_json::Value>,
) -> Result<Option<serde_json::Value>, CoreError> {
    let Some(edits) = edits else {
        return Ok(None);
    };
    let edit_fields = edits
        .as_object()
        .ok_or_else(|| CoreError::Validation("Outline edits must be a JSON object".into()))?;
    if edit_fields.is_empty() {
        return Ok(None);
    }

    let mut merged = data.clone();
    merge_into(&mut merged, edits);
    Ok(Some(merged))
}

fn merge_into(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match (target, patch) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

// ---------------------------------------------------------------------------
// Parent request snapshot
// ---------------------------------------------------------------------------

/// Reference stored on the parent request when an outline is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalSnapshot {
    pub outline_id: DbId,
    pub approved_at: Timestamp,
    pub chunk_count: i32,
    pub total_minutes: i32,
}

// ---------------------------------------------------------------------------
// Outline data
// ---------------------------------------------------------------------------

/// One node of the outline section tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<OutlineSection>,
}

/// Outline document stored in `outlines.outline_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineData {
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

/// Top-level outline sections as content points for chunk planning.
///
/// Reads leniently from stored JSON so reviewer edits that add fields do
/// not break planning. Entries without a title are skipped.
pub fn content_points_from_outline(data: &serde_json::Value) -> Vec<ContentPoint> {
    data.get("sections")
        .and_then(|s| s.as_array())
        .map(|sections| {
            sections
                .iter()
                .filter_map(|section| {
                    let title = section.get("title")?.as_str()?.trim();
                    if title.is_empty() {
                        return None;
                    }
                    Some(ContentPoint {
                        title: title.to_string(),
                        description: section
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        duration_minutes: section.get("estimated_minutes").and_then(|m| m.as_f64()),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn outline_doc() -> serde_json::Value {
        json!({
            "title": "The History of Tea",
            "sections": [
                {"title": "Origins", "description": "Legends of discovery", "estimated_minutes": 10.0},
                {"title": "Trade Routes", "description": "Silk road", "estimated_minutes": 15.0}
            ],
            "notes": {"tone": "warm", "audience": "general"}
        })
    }

    #[test]
    fn pending_outline_can_take_every_action() {
        for action in [OutlineAction::Approve, OutlineAction::Reject, OutlineAction::Regenerate] {
            assert_eq!(transition(OutlineStatus::Pending, action).unwrap(), action.target());
        }
    }

    #[test]
    fn decided_outlines_are_final() {
        for current in [
            OutlineStatus::Approved,
            OutlineStatus::Rejected,
            OutlineStatus::Regenerating,
        ] {
            assert_matches!(
                transition(current, OutlineAction::Approve),
                Err(CoreError::Conflict(_))
            );
        }
    }

    #[test]
    fn review_status_parsing() {
        assert_eq!(
            OutlineAction::from_review_status("approved").unwrap(),
            OutlineAction::Approve
        );
        assert_eq!(
            OutlineAction::from_review_status("rejected").unwrap(),
            OutlineAction::Reject
        );
        assert_matches!(
            OutlineAction::from_review_status("regenerating"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn non_owner_is_forbidden() {
        assert!(ensure_owner(7, 7).is_ok());
        assert_matches!(ensure_owner(7, 8), Err(CoreError::Forbidden(_)));
    }

    #[test]
    fn short_scripts_do_not_get_outlines() {
        assert!(validate_outline_minutes(30).is_ok());
        assert_matches!(validate_outline_minutes(29), Err(CoreError::Validation(_)));
    }

    #[test]
    fn approving_without_edits_leaves_data_untouched() {
        let data = outline_doc();
        assert_eq!(merge_edits(&data, None).unwrap(), None);
        assert_eq!(merge_edits(&data, Some(&json!({}))).unwrap(), None);
    }

    #[test]
    fn edits_merge_and_preserve_other_fields() {
        let data = outline_doc();
        let edits = json!({"title": "A Short History of Tea", "notes": {"tone": "playful"}});

        let merged = merge_edits(&data, Some(&edits)).unwrap().unwrap();
        assert_eq!(merged["title"], "A Short History of Tea");
        assert_eq!(merged["notes"]["tone"], "playful");
        assert_eq!(merged["notes"]["audience"], "general");
        assert_eq!(merged["sections"], data["sections"]);
    }

    #[test]
    fn edited_arrays_replace_stored_arrays() {
        let data = outline_doc();
        let edits = json!({"sections": [{"title": "Only One"}]});
        let merged = merge_edits(&data, Some(&edits)).unwrap().unwrap();
        assert_eq!(merged["sections"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn non_object_edits_are_rejected() {
        assert_matches!(
            merge_edits(&outline_doc(), Some(&json!(["nope"]))),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn content_points_come_from_top_level_sections() {
        let points = content_points_from_outline(&outline_doc());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].title, "Origins");
        assert_eq!(points[0].description, "Legends of discovery");
        assert_eq!(points[1].duration_minutes, Some(15.0));
    }

    #[test]
    fn content_points_skip_untitled_sections() {
        let data = json!({"sections": [{"title": "  "}, {"description": "x"}, {"title": "Kept"}]});
        let points = content_points_from_outline(&data);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].title, "Kept");
        assert!(content_points_from_outline(&json!({})).is_empty());
    }
}
