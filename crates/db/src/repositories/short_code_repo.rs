//! Repository for `short_code_index` and `case_messages`, the two fast paths
//! from something a staff member has in hand to a case id.

use chrono::Utc;

use crate::models::case::Case;
use crate::repositories::case_repo::COLUMNS as CASE_COLUMNS;
use crate::DbPool;

pub struct ShortCodeRepo;

impl ShortCodeRepo {
    /// Index a code. Returns `false` if the (workspace, code) pair was
    /// already taken.
    pub async fn insert_ignore(
        pool: &DbPool,
        workspace_id: &str,
        code: &str,
        case_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO short_code_index (workspace_id, code, case_id, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (workspace_id, code) DO NOTHING",
        )
        .bind(workspace_id)
        .bind(code)
        .bind(case_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Indexed lookup of a case by code.
    pub async fn find_case(
        pool: &DbPool,
        workspace_id: &str,
        code: &str,
    ) -> Result<Option<Case>, sqlx::Error> {
        let columns = prefixed_case_columns();
        let query = format!(
            "SELECT {columns} FROM short_code_index s
             JOIN cases c ON c.id = s.case_id
             WHERE s.workspace_id = $1 AND s.code = $2"
        );
        sqlx::query_as::<_, Case>(&query)
            .bind(workspace_id)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    /// Cases in a workspace with no index row.
    pub async fn list_unindexed(
        pool: &DbPool,
        workspace_id: &str,
    ) -> Result<Vec<Case>, sqlx::Error> {
        let columns = prefixed_case_columns();
        let query = format!(
            "SELECT {columns} FROM cases c
             WHERE c.workspace_id = $1
               AND NOT EXISTS (SELECT 1 FROM short_code_index s WHERE s.case_id = c.id)
             ORDER BY c.created_at ASC"
        );
        sqlx::query_as::<_, Case>(&query)
            .bind(workspace_id)
            .fetch_all(pool)
            .await
    }

    /// Number of index rows in a workspace.
    pub async fn count(pool: &DbPool, workspace_id: &str) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM short_code_index WHERE workspace_id = $1")
                .bind(workspace_id)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }
}

/// Links between platform messages and the cases they originated.
pub struct CaseMessageRepo;

impl CaseMessageRepo {
    /// Link a message to a case. Returns `false` if the message was already
    /// linked (to any case).
    pub async fn link(
        pool: &DbPool,
        message_id: &str,
        case_id: &str,
        workspace_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO case_messages (message_id, case_id, workspace_id, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (message_id) DO NOTHING",
        )
        .bind(message_id)
        .bind(case_id)
        .bind(workspace_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Case originated by a message, scoped to a workspace.
    pub async fn find_case(
        pool: &DbPool,
        workspace_id: &str,
        message_id: &str,
    ) -> Result<Option<Case>, sqlx::Error> {
        let columns = prefixed_case_columns();
        let query = format!(
            "SELECT {columns} FROM case_messages m
             JOIN cases c ON c.id = m.case_id
             WHERE m.workspace_id = $1 AND m.message_id = $2"
        );
        sqlx::query_as::<_, Case>(&query)
            .bind(workspace_id)
            .bind(message_id)
            .fetch_optional(pool)
            .await
    }
}

fn prefixed_case_columns() -> String {
    CASE_COLUMNS
        .split(',')
        .map(|c| format!("c.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
