//! Per-ticket transcript buffers and their flush to the archive channel.
//!
//! The buffer is a convenience; message mappings are the durable record.
//! A flush rebuilds the transcript from the mappings whenever the buffer
//! holds fewer lines than were persisted (for example after a restart).

use std::collections::HashMap;
use std::sync::Arc;

use gatehouse_core::providers::ChannelProvider;
use gatehouse_core::relay::Direction;
use gatehouse_core::transcript::{render, transcript_filename, Side, TranscriptLine, TranscriptRef};
use gatehouse_core::types::DbId;
use gatehouse_db::models::ticket::{MessageMapping, Ticket};
use gatehouse_db::repositories::MessageMappingRepo;
use gatehouse_db::DbPool;
use gatehouse_events::{event_types, EventBus, ReviewEvent};
use tokio::sync::Mutex;

use crate::error::ReviewResult;
use crate::notices;

pub struct TranscriptRecorder {
    pool: DbPool,
    channels: Arc<dyn ChannelProvider>,
    bus: Arc<EventBus>,
    archive_channel_id: Option<String>,
    buffers: Mutex<HashMap<DbId, Vec<TranscriptLine>>>,
}

impl TranscriptRecorder {
    pub fn new(
        pool: DbPool,
        channels: Arc<dyn ChannelProvider>,
        bus: Arc<EventBus>,
        archive_channel_id: Option<String>,
    ) -> Self {
        Self {
            pool,
            channels,
            bus,
            archive_channel_id,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn append(&self, ticket_id: DbId, line: TranscriptLine) {
        self.buffers
            .lock()
            .await
            .entry(ticket_id)
            .or_default()
            .push(line);
    }

    pub async fn buffered_len(&self, ticket_id: DbId) -> usize {
        self.buffers
            .lock()
            .await
            .get(&ticket_id)
            .map_or(0, Vec::len)
    }

    /// Drop a ticket's buffer without archiving it.
    pub async fn discard(&self, ticket_id: DbId) {
        self.buffers.lock().await.remove(&ticket_id);
    }

    /// Lines for a ticket: the buffer, or the persisted mappings when they
    /// are more complete.
    pub async fn lines_for(&self, ticket_id: DbId) -> ReviewResult<Vec<TranscriptLine>> {
        let buffered = self
            .buffers
            .lock()
            .await
            .get(&ticket_id)
            .cloned()
            .unwrap_or_default();

        let mappings = MessageMappingRepo::list_for_ticket(&self.pool, ticket_id).await?;
        if mappings.len() >= buffered.len() && !mappings.is_empty() {
            if buffered.is_empty() {
                tracing::info!(ticket_id, lines = mappings.len(), "Rebuilding transcript from message mappings");
            }
            return Ok(mappings.iter().map(line_from_mapping).collect());
        }
        Ok(buffered)
    }

    /// Render and archive a ticket's transcript, then clear its buffer.
    ///
    /// Returns `None` when there is nothing to archive. A failed upload keeps
    /// the buffer for a retry, publishes `transcript.flush_failed`, and returns
    /// the error. Closing a bridge discards the buffer either way.
    pub async fn flush(&self, ticket: &Ticket) -> ReviewResult<Option<TranscriptRef>> {
        let lines = self.lines_for(ticket.id).await?;
        if lines.is_empty() {
            self.discard(ticket.id).await;
            return Ok(None);
        }

        let Some(archive) = self.archive_channel_id.as_deref() else {
            tracing::warn!(ticket_id = ticket.id, "No transcript channel configured, transcript not archived");
            self.report_failure(ticket, "no transcript channel configured");
            return Ok(None);
        };

        let body = render(&lines);
        let caption = notices::transcript_caption(ticket.id, &ticket.applicant_id, lines.len());
        match self
            .channels
            .upload_transcript(archive, &transcript_filename(ticket.id), &body, &caption)
            .await
        {
            Ok(message_id) => {
                self.discard(ticket.id).await;
                tracing::info!(ticket_id = ticket.id, lines = lines.len(), "Transcript archived");
                Ok(Some(TranscriptRef {
                    channel_id: archive.to_string(),
                    message_id,
                    line_count: lines.len(),
                }))
            }
            Err(e) => {
                tracing::error!(ticket_id = ticket.id, error = %e, "Transcript upload failed");
                self.report_failure(ticket, &e.to_string());
                Err(e.into())
            }
        }
    }

    fn report_failure(&self, ticket: &Ticket, error: &str) {
        self.bus.publish(
            ReviewEvent::new(event_types::TRANSCRIPT_FLUSH_FAILED)
                .with_ticket(ticket.id)
                .with_payload(serde_json::json!({
                    "applicant_id": ticket.applicant_id,
                    "error": error,
                })),
        );
    }
}

fn line_from_mapping(mapping: &MessageMapping) -> TranscriptLine {
    let side = match mapping.direction.parse::<Direction>() {
        Ok(Direction::ToHandler) => Side::Applicant,
        _ => Side::Staff,
    };
    TranscriptLine {
        at: mapping.created_at,
        side,
        author: mapping.author_name.clone(),
        content: mapping.content.clone(),
        attachment_urls: mapping.attachment_urls.0.clone(),
    }
}
