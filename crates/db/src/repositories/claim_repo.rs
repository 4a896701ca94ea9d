//! Repository for the `claims` table.

use chrono::Utc;
use gatehouse_core::case_status::CaseStatus;
use gatehouse_core::claim::{ClaimOutcome, UnclaimOutcome};
use gatehouse_core::decision::ActionKind;

use crate::models::case::{Claim, CreateActionRecord};
use crate::repositories::action_repo::ActionRepo;
use crate::repositories::case_repo::lock_case;
use crate::DbPool;

/// Column list for claims queries.
const COLUMNS: &str = "case_id, handler_id, claimed_at";

/// Exclusive single-owner assignment of a case to a handler.
pub struct ClaimRepo;

impl ClaimRepo {
    /// Current claim on a case, if any.
    pub async fn get(pool: &DbPool, case_id: &str) -> Result<Option<Claim>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM claims WHERE case_id = $1");
        sqlx::query_as::<_, Claim>(&query)
            .bind(case_id)
            .fetch_optional(pool)
            .await
    }

    /// Claim or refresh a claim.
    ///
    /// Re-claiming as the same handler moves `claimed_at`; claiming a case
    /// held by someone else changes nothing and returns `None`.
    pub async fn upsert(
        pool: &DbPool,
        case_id: &str,
        handler_id: &str,
    ) -> Result<Option<Claim>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        upsert_on(&mut conn, case_id, handler_id).await
    }

    /// Remove any claim on a case. Returns whether a row was deleted.
    pub async fn clear(pool: &DbPool, case_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM claims WHERE case_id = $1")
            .bind(case_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transactional claim acquisition with a `claim` audit record.
    ///
    /// Only `submitted` and `needs_info` cases can be claimed.
    pub async fn acquire(
        pool: &DbPool,
        case_id: &str,
        handler_id: &str,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if !lock_case(&mut tx, case_id).await? {
            return Ok(ClaimOutcome::NotFound);
        }

        let (status,): (String,) = sqlx::query_as("SELECT status FROM cases WHERE id = $1")
            .bind(case_id)
            .fetch_one(&mut *tx)
            .await?;
        let status: CaseStatus = status
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        if !status.is_decidable() {
            return Ok(ClaimOutcome::InvalidStatus { status });
        }

        let query = format!("SELECT {COLUMNS} FROM claims WHERE case_id = $1");
        let existing = sqlx::query_as::<_, Claim>(&query)
            .bind(case_id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(existing) = &existing {
            if existing.handler_id != handler_id {
                return Ok(ClaimOutcome::AlreadyClaimed {
                    holder_id: existing.handler_id.clone(),
                });
            }
        }

        let Some(claim) = upsert_on(&mut tx, case_id, handler_id).await? else {
            // Another handler's row slipped in past the status read.
            let holder = Self::holder_on(&mut tx, case_id).await?;
            return Ok(ClaimOutcome::AlreadyClaimed {
                holder_id: holder.unwrap_or_default(),
            });
        };

        let refreshed = existing.is_some();
        if !refreshed {
            ActionRepo::insert(
                &mut tx,
                &CreateActionRecord {
                    case_id: case_id.to_string(),
                    handler_id: handler_id.to_string(),
                    action: ActionKind::Claim.as_str().to_string(),
                    reason: None,
                    metadata: None,
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(ClaimOutcome::Claimed {
            handler_id: claim.handler_id,
            claimed_at: claim.claimed_at,
            refreshed,
        })
    }

    /// Release a claim held by `handler_id`, recording an `unclaim` action.
    pub async fn release(
        pool: &DbPool,
        case_id: &str,
        handler_id: &str,
    ) -> Result<UnclaimOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM claims WHERE case_id = $1 AND handler_id = $2")
            .bind(case_id)
            .bind(handler_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            let outcome = match Self::holder_on(&mut tx, case_id).await? {
                Some(holder_id) => UnclaimOutcome::NotOwner { holder_id },
                None => UnclaimOutcome::NotClaimed,
            };
            return Ok(outcome);
        }

        ActionRepo::insert(
            &mut tx,
            &CreateActionRecord {
                case_id: case_id.to_string(),
                handler_id: handler_id.to_string(),
                action: ActionKind::Unclaim.as_str().to_string(),
                reason: None,
                metadata: None,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(UnclaimOutcome::Released)
    }

    async fn holder_on(
        conn: &mut sqlx::SqliteConnection,
        case_id: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT handler_id FROM claims WHERE case_id = $1")
            .bind(case_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|r| r.0))
    }
}

async fn upsert_on(
    conn: &mut sqlx::SqliteConnection,
    case_id: &str,
    handler_id: &str,
) -> Result<Option<Claim>, sqlx::Error> {
    let query = format!(
        "INSERT INTO claims (case_id, handler_id, claimed_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (case_id) DO UPDATE SET claimed_at = excluded.claimed_at
         WHERE claims.handler_id = excluded.handler_id
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Claim>(&query)
        .bind(case_id)
        .bind(handler_id)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await
}
