//! Repository for the `cases` table.

use chrono::Utc;
use gatehouse_core::case_status::OPEN_STATUSES;
use gatehouse_core::short_code::derive_short_code;
use uuid::Uuid;

use crate::models::case::{Case, CreateCase};
use crate::DbPool;

/// Column list for cases queries.
pub(crate) const COLUMNS: &str = "id, workspace_id, applicant_id, status, created_at, \
    submitted_at, updated_at, resolved_at, resolver_id, resolution_reason, \
    permanently_rejected, permanently_rejected_at";

/// Provides intake and lookup operations for cases.
///
/// Status changes after submission go through `DecisionRepo`.
pub struct CaseRepo;

impl CaseRepo {
    /// Create a draft case.
    ///
    /// The short-code index row (and the originating message link, if any)
    /// are written in the same transaction, so every new case is resolvable
    /// by code without a fallback scan.
    pub async fn create(pool: &DbPool, input: &CreateCase) -> Result<Case, sqlx::Error> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO cases (id, workspace_id, applicant_id, status, created_at, updated_at)
             VALUES ($1, $2, $3, 'draft', $4, $4)
             RETURNING {COLUMNS}"
        );
        let case = sqlx::query_as::<_, Case>(&query)
            .bind(&id)
            .bind(&input.workspace_id)
            .bind(&input.applicant_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        match derive_short_code(&case.id) {
            Ok(code) => {
                sqlx::query(
                    "INSERT INTO short_code_index (workspace_id, code, case_id, created_at)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (workspace_id, code) DO NOTHING",
                )
                .bind(&case.workspace_id)
                .bind(&code)
                .bind(&case.id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            Err(e) => tracing::warn!(case_id = %case.id, error = %e, "Skipping short-code index"),
        }

        if let Some(message_id) = &input.origin_message_id {
            sqlx::query(
                "INSERT INTO case_messages (message_id, case_id, workspace_id, created_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(message_id)
            .bind(&case.id)
            .bind(&case.workspace_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(case)
    }

    /// Find a case by its full id.
    pub async fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<Case>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cases WHERE id = $1");
        sqlx::query_as::<_, Case>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move a draft to `submitted`. Returns `None` if the case does not exist
    /// or is no longer a draft.
    pub async fn submit(pool: &DbPool, id: &str) -> Result<Option<Case>, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "UPDATE cases SET status = 'submitted', submitted_at = $2, updated_at = $2
             WHERE id = $1 AND status = 'draft'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Case>(&query)
            .bind(id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Most recent non-terminal case for an applicant in a workspace.
    pub async fn find_open_by_applicant(
        pool: &DbPool,
        workspace_id: &str,
        applicant_id: &str,
    ) -> Result<Option<Case>, sqlx::Error> {
        let statuses = OPEN_STATUSES
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT {COLUMNS} FROM cases
             WHERE workspace_id = $1 AND applicant_id = $2 AND status IN ({statuses})
             ORDER BY created_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Case>(&query)
            .bind(workspace_id)
            .bind(applicant_id)
            .fetch_optional(pool)
            .await
    }

    /// All cases in a workspace, oldest first.
    pub async fn list_by_workspace(
        pool: &DbPool,
        workspace_id: &str,
    ) -> Result<Vec<Case>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cases
             WHERE workspace_id = $1
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Case>(&query)
            .bind(workspace_id)
            .fetch_all(pool)
            .await
    }
}

/// Take the write lock on a case row inside `tx` and report whether it exists.
///
/// SQLite upgrades a deferred transaction to a writer on its first write, so
/// writing before reading keeps concurrent read-then-write transactions on the
/// same case serialized instead of failing with `SQLITE_BUSY`.
pub(crate) async fn lock_case(
    tx: &mut sqlx::SqliteConnection,
    case_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE cases SET updated_at = updated_at WHERE id = $1")
        .bind(case_id)
        .execute(&mut *tx)
        .await?;
    Ok(result.rows_affected() > 0)
}
