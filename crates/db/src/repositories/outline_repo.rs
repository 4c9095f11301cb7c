//! Repository for the `outlines` table.
//!
//! Outlines are never deleted. Every transition is guarded by
//! `status_id = pending` in SQL so concurrent reviews cannot both win.

use sqlx::PgPool;

use longform_core::outline::{ApprovalSnapshot, OutlineStatus, STEP_OUTLINE_APPROVED};
use longform_core::types::DbId;

use crate::models::outline::{NewOutline, Outline};

/// Column list for `outlines` queries.
const COLUMNS: &str = "\
    id, parent_request_id, title, total_minutes, chunk_count, outline_data, \
    status_id, research_score, user_feedback, approved_at, created_at, updated_at";

pub struct OutlineRepo;

impl OutlineRepo {
    /// Insert a new pending outline, marking any pending outline of the
    /// same request as `regenerating` first.
    pub async fn create_superseding(
        pool: &PgPool,
        input: &NewOutline,
    ) -> Result<Outline, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE outlines SET status_id = $2 \
             WHERE parent_request_id = $1 AND status_id = $3",
        )
        .bind(input.parent_request_id)
        .bind(OutlineStatus::Regenerating.id())
        .bind(OutlineStatus::Pending.id())
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO outlines \
                (parent_request_id, title, total_minutes, chunk_count, outline_data, \
                 status_id, research_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        let outline = sqlx::query_as::<_, Outline>(&query)
            .bind(input.parent_request_id)
            .bind(&input.title)
            .bind(input.total_minutes)
            .bind(input.chunk_count)
            .bind(&input.outline_data)
            .bind(OutlineStatus::Pending.id())
            .bind(input.research_score)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(outline)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Outline>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM outlines WHERE id = $1");
        sqlx::query_as::<_, Outline>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently created outline for a request, in any status.
    pub async fn latest_for_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Option<Outline>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outlines \
             WHERE parent_request_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Outline>(&query)
            .bind(request_id)
            .fetch_optional(pool)
            .await
    }

    /// Latest approved outline for a request.
    pub async fn approved_for_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Option<Outline>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outlines \
             WHERE parent_request_id = $1 AND status_id = $2 \
             ORDER BY approved_at DESC NULLS LAST, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Outline>(&query)
            .bind(request_id)
            .bind(OutlineStatus::Approved.id())
            .fetch_optional(pool)
            .await
    }

    /// Feedback left on the most recent rejected or regenerating outline.
    pub async fn latest_feedback(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT user_feedback FROM outlines \
             WHERE parent_request_id = $1 \
               AND status_id IN ($2, $3) \
               AND user_feedback IS NOT NULL \
             ORDER BY updated_at DESC, id DESC \
             LIMIT 1",
        )
        .bind(request_id)
        .bind(OutlineStatus::Rejected.id())
        .bind(OutlineStatus::Regenerating.id())
        .fetch_optional(pool)
        .await
    }

    /// Move a pending outline to `to`, recording feedback.
    ///
    /// Returns `None` if the outline is no longer pending.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        to: OutlineStatus,
        feedback: Option<&str>,
    ) -> Result<Option<Outline>, sqlx::Error> {
        let query = format!(
            "UPDATE outlines \
             SET status_id = $2, user_feedback = COALESCE($3, user_feedback) \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Outline>(&query)
            .bind(id)
            .bind(to.id())
            .bind(feedback)
            .bind(OutlineStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Approve a pending outline and record the approval on its parent
    /// request, in one transaction.
    ///
    /// `outline_data` is only written when `merged_data` is `Some`, so an
    /// approval without edits leaves the stored document as it was.
    /// Returns `None` (and changes nothing) if the outline is not pending.
    pub async fn approve(
        pool: &PgPool,
        id: DbId,
        feedback: Option<&str>,
        merged_data: Option<&serde_json::Value>,
    ) -> Result<Option<Outline>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE outlines SET \
                status_id = $2, \
                approved_at = NOW(), \
                user_feedback = COALESCE($3, user_feedback), \
                outline_data = COALESCE($4, outline_data) \
             WHERE id = $1 AND status_id = $5 \
             RETURNING {COLUMNS}"
        );
        let Some(outline) = sqlx::query_as::<_, Outline>(&query)
            .bind(id)
            .bind(OutlineStatus::Approved.id())
            .bind(feedback)
            .bind(merged_data)
            .bind(OutlineStatus::Pending.id())
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let approved_at = outline.approved_at.unwrap_or(outline.updated_at);
        let snapshot = ApprovalSnapshot {
            outline_id: outline.id,
            approved_at,
            chunk_count: outline.chunk_count,
            total_minutes: outline.total_minutes,
        };
        let snapshot = serde_json::to_value(&snapshot)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            "UPDATE script_requests SET \
                completed_steps = CASE \
                    WHEN completed_steps @> jsonb_build_array($2::TEXT) THEN completed_steps \
                    ELSE completed_steps || jsonb_build_array($2::TEXT) END, \
                approved_outline = $3 \
             WHERE id = $1",
        )
        .bind(outline.parent_request_id)
        .bind(STEP_OUTLINE_APPROVED)
        .bind(&snapshot)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(outline))
    }
}
