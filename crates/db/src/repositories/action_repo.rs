//! Repository for the append-only `action_records` table.

use chrono::Utc;
use gatehouse_core::types::DbId;

use crate::models::case::{ActionRecord, CreateActionRecord};
use crate::DbPool;

/// Column list for action_records queries.
const COLUMNS: &str = "id, case_id, handler_id, action, created_at, reason, metadata";

/// Appends and reads audit entries. Rows are never updated except to merge
/// post-hoc metadata.
pub struct ActionRepo;

impl ActionRepo {
    /// Append an action record, returning the created row.
    pub async fn create(
        pool: &DbPool,
        input: &CreateActionRecord,
    ) -> Result<ActionRecord, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        let id = Self::insert(&mut conn, input).await?;
        let query = format!("SELECT {COLUMNS} FROM action_records WHERE id = $1");
        sqlx::query_as::<_, ActionRecord>(&query)
            .bind(id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Append an action record on an open connection or transaction,
    /// returning its id.
    pub async fn insert(
        conn: &mut sqlx::SqliteConnection,
        input: &CreateActionRecord,
    ) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO action_records (case_id, handler_id, action, created_at, reason, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(&input.case_id)
        .bind(&input.handler_id)
        .bind(&input.action)
        .bind(Utc::now().timestamp())
        .bind(&input.reason)
        .bind(input.metadata.as_ref().map(|m| m.to_string()))
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }

    /// All actions for a case in insertion order.
    pub async fn list_for_case(
        pool: &DbPool,
        case_id: &str,
    ) -> Result<Vec<ActionRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM action_records
             WHERE case_id = $1
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, ActionRecord>(&query)
            .bind(case_id)
            .fetch_all(pool)
            .await
    }

    /// Merge `patch` into the record's metadata object (RFC 7396 semantics).
    pub async fn attach_metadata(
        pool: &DbPool,
        id: DbId,
        patch: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE action_records
             SET metadata = json_patch(COALESCE(metadata, '{}'), $2)
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.to_string())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count actions of one kind for a case.
    pub async fn count_for_case(
        pool: &DbPool,
        case_id: &str,
        action: &str,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM action_records WHERE case_id = $1 AND action = $2",
        )
        .bind(case_id)
        .bind(action)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
