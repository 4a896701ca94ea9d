//! Repository for the `message_mappings` table.

use chrono::Utc;
use gatehouse_core::types::DbId;

use crate::models::ticket::{CreateMessageMapping, MessageMapping};
use crate::DbPool;

/// Column list for message_mappings queries.
const COLUMNS: &str = "id, ticket_id, direction, relay_message_id, private_message_id, \
    relay_reply_to_id, private_reply_to_id, author_name, content, attachment_urls, created_at";

pub struct MessageMappingRepo;

impl MessageMappingRepo {
    /// Record a relayed message. A second write for the same relay message
    /// replaces the counterpart and content but keeps the original row.
    pub async fn upsert(
        pool: &DbPool,
        input: &CreateMessageMapping,
    ) -> Result<MessageMapping, sqlx::Error> {
        let urls = serde_json::to_string(&input.attachment_urls)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let query = format!(
            "INSERT INTO message_mappings
                (ticket_id, direction, relay_message_id, private_message_id,
                 relay_reply_to_id, private_reply_to_id, author_name, content,
                 attachment_urls, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (relay_message_id) DO UPDATE SET
                private_message_id = excluded.private_message_id,
                private_reply_to_id = COALESCE(excluded.private_reply_to_id, private_reply_to_id),
                relay_reply_to_id = COALESCE(excluded.relay_reply_to_id, relay_reply_to_id),
                content = excluded.content,
                attachment_urls = excluded.attachment_urls
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MessageMapping>(&query)
            .bind(input.ticket_id)
            .bind(&input.direction)
            .bind(&input.relay_message_id)
            .bind(&input.private_message_id)
            .bind(&input.relay_reply_to_id)
            .bind(&input.private_reply_to_id)
            .bind(&input.author_name)
            .bind(&input.content)
            .bind(urls)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_relay_id(
        pool: &DbPool,
        relay_message_id: &str,
    ) -> Result<Option<MessageMapping>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM message_mappings WHERE relay_message_id = $1");
        sqlx::query_as::<_, MessageMapping>(&query)
            .bind(relay_message_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_private_id(
        pool: &DbPool,
        private_message_id: &str,
    ) -> Result<Option<MessageMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM message_mappings
             WHERE private_message_id = $1
             ORDER BY id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, MessageMapping>(&query)
            .bind(private_message_id)
            .fetch_optional(pool)
            .await
    }

    /// Every mapping for a ticket in creation order.
    pub async fn list_for_ticket(
        pool: &DbPool,
        ticket_id: DbId,
    ) -> Result<Vec<MessageMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM message_mappings
             WHERE ticket_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, MessageMapping>(&query)
            .bind(ticket_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_ticket(pool: &DbPool, ticket_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM message_mappings WHERE ticket_id = $1")
                .bind(ticket_id)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }
}
