//! Repository for `tickets` and the `open_ticket_guard` mutex table.
//!
//! The guard row for a (workspace, applicant) pair is inserted with the
//! `pending` placeholder before any relay channel exists. Its primary key is
//! what serializes concurrent open attempts; everything else is bookkeeping.

use chrono::{Duration, Utc};
use gatehouse_core::bridge::{within_reopen_window, GuardState, GUARD_PENDING};
use gatehouse_core::types::{DbId, Timestamp};

use crate::models::ticket::{CreateTicket, OpenTicketGuard, Ticket};
use crate::DbPool;

/// Column list for tickets queries.
const COLUMNS: &str = "id, workspace_id, applicant_id, case_code, origin_message_id, \
    channel_id, status, created_at, closed_at, close_reason, \
    transcript_channel_id, transcript_message_id";

/// Column list for open_ticket_guard queries.
const GUARD_COLUMNS: &str = "workspace_id, applicant_id, channel_id, ticket_id, created_at";

/// Result of [`TicketRepo::reserve`].
#[derive(Debug, Clone)]
pub enum Reservation {
    /// The caller won the guard and owns the ticket until it activates or
    /// releases it.
    Reserved {
        ticket: Ticket,
        reopened: bool,
        /// Channel the reused ticket had before it closed.
        previous_channel_id: Option<String>,
    },
    /// A bridge is already open.
    Exists { channel_id: String },
    /// Another caller holds the `pending` guard.
    InProgress,
}

pub struct TicketRepo;

impl TicketRepo {
    /// Current guard row for a pair.
    pub async fn find_guard(
        pool: &DbPool,
        workspace_id: &str,
        applicant_id: &str,
    ) -> Result<Option<OpenTicketGuard>, sqlx::Error> {
        let query = format!(
            "SELECT {GUARD_COLUMNS} FROM open_ticket_guard
             WHERE workspace_id = $1 AND applicant_id = $2"
        );
        sqlx::query_as::<_, OpenTicketGuard>(&query)
            .bind(workspace_id)
            .bind(applicant_id)
            .fetch_optional(pool)
            .await
    }

    /// Take the guard for a pair and create (or reopen) its ticket.
    ///
    /// The guard insert is the first statement, so the transaction holds the
    /// write lock before it reads anything. A conflicting insert means another
    /// caller got there first; their guard decides the outcome. A ticket
    /// closed within `reopen_window_days` of `now` is reused with its channel
    /// cleared, otherwise a fresh ticket is created. Abandoned tickets (closed
    /// without ever getting a channel) are never reused.
    pub async fn reserve(
        pool: &DbPool,
        input: &CreateTicket,
        now: Timestamp,
        reopen_window_days: i64,
    ) -> Result<Reservation, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO open_ticket_guard (workspace_id, applicant_id, channel_id, ticket_id, created_at)
             VALUES ($1, $2, $3, NULL, $4)
             ON CONFLICT (workspace_id, applicant_id) DO NOTHING",
        )
        .bind(&input.workspace_id)
        .bind(&input.applicant_id)
        .bind(GUARD_PENDING)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            let (channel_id,): (String,) = sqlx::query_as(
                "SELECT channel_id FROM open_ticket_guard
                 WHERE workspace_id = $1 AND applicant_id = $2",
            )
            .bind(&input.workspace_id)
            .bind(&input.applicant_id)
            .fetch_one(&mut *tx)
            .await?;
            return Ok(match GuardState::from_channel(Some(&channel_id)) {
                GuardState::Open { channel_id } => Reservation::Exists { channel_id },
                GuardState::Pending | GuardState::Absent => Reservation::InProgress,
            });
        }

        let query = format!(
            "SELECT {COLUMNS} FROM tickets
             WHERE workspace_id = $1 AND applicant_id = $2 AND status = 'closed'
               AND channel_id IS NOT NULL
             ORDER BY closed_at DESC, id DESC
             LIMIT 1"
        );
        let last_closed = sqlx::query_as::<_, Ticket>(&query)
            .bind(&input.workspace_id)
            .bind(&input.applicant_id)
            .fetch_optional(&mut *tx)
            .await?;

        let reusable = last_closed.filter(|t| {
            t.closed_at
                .is_some_and(|closed_at| within_reopen_window(closed_at, now, reopen_window_days))
        });

        let (ticket, reopened, previous_channel_id) = match reusable {
            Some(previous) => {
                let query = format!(
                    "UPDATE tickets SET
                        status = 'open',
                        channel_id = NULL,
                        closed_at = NULL,
                        close_reason = NULL,
                        case_code = COALESCE($2, case_code),
                        origin_message_id = COALESCE($3, origin_message_id)
                     WHERE id = $1
                     RETURNING {COLUMNS}"
                );
                let ticket = sqlx::query_as::<_, Ticket>(&query)
                    .bind(previous.id)
                    .bind(&input.case_code)
                    .bind(&input.origin_message_id)
                    .fetch_one(&mut *tx)
                    .await?;
                (ticket, true, previous.channel_id)
            }
            None => {
                let query = format!(
                    "INSERT INTO tickets
                        (workspace_id, applicant_id, case_code, origin_message_id, status, created_at)
                     VALUES ($1, $2, $3, $4, 'open', $5)
                     RETURNING {COLUMNS}"
                );
                let ticket = sqlx::query_as::<_, Ticket>(&query)
                    .bind(&input.workspace_id)
                    .bind(&input.applicant_id)
                    .bind(&input.case_code)
                    .bind(&input.origin_message_id)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?;
                (ticket, false, None)
            }
        };

        sqlx::query(
            "UPDATE open_ticket_guard SET ticket_id = $3
             WHERE workspace_id = $1 AND applicant_id = $2",
        )
        .bind(&input.workspace_id)
        .bind(&input.applicant_id)
        .bind(ticket.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Reservation::Reserved {
            ticket,
            reopened,
            previous_channel_id,
        })
    }

    /// Replace the `pending` placeholder with the real channel id and record
    /// it on the ticket.
    ///
    /// Returns `false` if the pending guard for this ticket is gone (swept as
    /// stale), in which case nothing is written.
    pub async fn activate(
        pool: &DbPool,
        ticket: &Ticket,
        channel_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE open_ticket_guard SET channel_id = $4
             WHERE workspace_id = $1 AND applicant_id = $2 AND ticket_id = $3
               AND channel_id = $5",
        )
        .bind(&ticket.workspace_id)
        .bind(&ticket.applicant_id)
        .bind(ticket.id)
        .bind(channel_id)
        .bind(GUARD_PENDING)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE tickets SET channel_id = $2 WHERE id = $1")
            .bind(ticket.id)
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Delete this ticket's `pending` guard row.
    pub async fn release_pending(pool: &DbPool, ticket: &Ticket) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM open_ticket_guard
             WHERE workspace_id = $1 AND applicant_id = $2 AND ticket_id = $3
               AND channel_id = $4",
        )
        .bind(&ticket.workspace_id)
        .bind(&ticket.applicant_id)
        .bind(ticket.id)
        .bind(GUARD_PENDING)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Close a ticket that never got a channel.
    pub async fn abandon(pool: &DbPool, ticket_id: DbId, reason: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET status = 'closed', closed_at = $2, close_reason = $3
             WHERE id = $1 AND status = 'open' AND channel_id IS NULL",
        )
        .bind(ticket_id)
        .bind(Utc::now())
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tickets WHERE id = $1");
        sqlx::query_as::<_, Ticket>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent ticket (open or closed) that used a relay channel.
    pub async fn find_by_channel(
        pool: &DbPool,
        channel_id: &str,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tickets
             WHERE channel_id = $1
             ORDER BY id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(channel_id)
            .fetch_optional(pool)
            .await
    }

    /// Open, activated ticket for a relay channel.
    pub async fn find_open_by_channel(
        pool: &DbPool,
        channel_id: &str,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tickets
             WHERE channel_id = $1 AND status = 'open'"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(channel_id)
            .fetch_optional(pool)
            .await
    }

    /// Open, activated ticket for an applicant. Without a workspace, the most
    /// recently created one across workspaces wins.
    pub async fn find_open_for_applicant(
        pool: &DbPool,
        workspace_id: Option<&str>,
        applicant_id: &str,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tickets
             WHERE applicant_id = $1
               AND ($2 IS NULL OR workspace_id = $2)
               AND status = 'open' AND channel_id IS NOT NULL
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(applicant_id)
            .bind(workspace_id)
            .fetch_optional(pool)
            .await
    }

    /// Relay channel ids of every open, activated ticket.
    pub async fn list_open_channels(pool: &DbPool) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT channel_id FROM tickets
             WHERE status = 'open' AND channel_id IS NOT NULL
             ORDER BY id ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Delete the guard row for a ticket, whatever its channel value.
    pub async fn delete_guard(pool: &DbPool, ticket: &Ticket) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM open_ticket_guard
             WHERE workspace_id = $1 AND applicant_id = $2 AND ticket_id = $3",
        )
        .bind(&ticket.workspace_id)
        .bind(&ticket.applicant_id)
        .bind(ticket.id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an open ticket closed. Returns `false` if it was already closed.
    pub async fn mark_closed(
        pool: &DbPool,
        ticket_id: DbId,
        reason: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET status = 'closed', closed_at = $2, close_reason = $3
             WHERE id = $1 AND status = 'open'",
        )
        .bind(ticket_id)
        .bind(Utc::now())
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record where a ticket's transcript was archived.
    pub async fn set_transcript(
        pool: &DbPool,
        ticket_id: DbId,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tickets SET transcript_channel_id = $2, transcript_message_id = $3
             WHERE id = $1",
        )
        .bind(ticket_id)
        .bind(channel_id)
        .bind(message_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete `pending` guard rows older than `max_age` and close the tickets
    /// they were reserving. Returns the number of guard rows removed.
    pub async fn sweep_stale_pending(pool: &DbPool, max_age: Duration) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now() - max_age;
        let mut tx = pool.begin().await?;

        let swept: Vec<(Option<DbId>,)> = sqlx::query_as(
            "DELETE FROM open_ticket_guard
             WHERE channel_id = $1 AND created_at < $2
             RETURNING ticket_id",
        )
        .bind(GUARD_PENDING)
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        for ticket_id in swept.iter().filter_map(|r| r.0) {
            sqlx::query(
                "UPDATE tickets SET status = 'closed', closed_at = $2, close_reason = 'abandoned'
                 WHERE id = $1 AND status = 'open' AND channel_id IS NULL",
            )
            .bind(ticket_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(swept.len() as u64)
    }

    /// Re-insert guard rows for open, activated tickets that lost theirs
    /// (a crash between the guard delete and the close). Returns the number
    /// of rows restored.
    pub async fn restore_missing_guards(pool: &DbPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO open_ticket_guard (workspace_id, applicant_id, channel_id, ticket_id, created_at)
             SELECT t.workspace_id, t.applicant_id, t.channel_id, t.id, t.created_at
             FROM tickets t
             WHERE t.status = 'open' AND t.channel_id IS NOT NULL
             ORDER BY t.id DESC
             ON CONFLICT (workspace_id, applicant_id) DO NOTHING",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
