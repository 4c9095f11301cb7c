//! Repository for the `script_requests` table.

use sqlx::PgPool;

use longform_core::types::DbId;

use crate::models::script_request::{CreateScriptRequest, ScriptRequest};

/// Column list for `script_requests` queries.
const COLUMNS: &str = "\
    id, owner_id, title, topic, target_minutes, completed_steps, approved_outline, \
    created_at, updated_at";

pub struct ScriptRequestRepo;

impl ScriptRequestRepo {
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateScriptRequest,
    ) -> Result<ScriptRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO script_requests (owner_id, title, topic, target_minutes) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScriptRequest>(&query)
            .bind(owner_id)
            .bind(&input.title)
            .bind(&input.topic)
            .bind(input.target_minutes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ScriptRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM script_requests WHERE id = $1");
        sqlx::query_as::<_, ScriptRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Requests owned by `owner_id`, newest first.
    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<ScriptRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM script_requests \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, ScriptRequest>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }
}
