//! Repository for the `research_sources` table.

use sqlx::PgPool;

use longform_core::types::DbId;

use crate::models::research_source::{CreateResearchSource, ResearchSourceRow};

/// Column list for `research_sources` queries.
const COLUMNS: &str = "\
    id, script_request_id, source_type, title, url, word_count, quality_score, \
    is_selected, is_user_document, created_at, updated_at";

pub struct ResearchSourceRepo;

impl ResearchSourceRepo {
    pub async fn create(
        pool: &PgPool,
        script_request_id: DbId,
        input: &CreateResearchSource,
    ) -> Result<ResearchSourceRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO research_sources \
                (script_request_id, source_type, title, url, word_count, \
                 quality_score, is_selected, is_user_document) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, 0.5), COALESCE($7, true), COALESCE($8, false)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ResearchSourceRow>(&query)
            .bind(script_request_id)
            .bind(&input.source_type)
            .bind(&input.title)
            .bind(&input.url)
            .bind(input.word_count)
            .bind(input.quality_score)
            .bind(input.is_selected)
            .bind(input.is_user_document)
            .fetch_one(pool)
            .await
    }

    /// All sources of a request, oldest first.
    pub async fn list_for_request(
        pool: &PgPool,
        script_request_id: DbId,
    ) -> Result<Vec<ResearchSourceRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM research_sources \
             WHERE script_request_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, ResearchSourceRow>(&query)
            .bind(script_request_id)
            .fetch_all(pool)
            .await
    }
}
