//! Relays messages between relay channels and applicants' private channels.

use std::sync::Arc;

use chrono::Utc;
use gatehouse_core::error::CoreError;
use gatehouse_core::providers::Delivery;
use gatehouse_core::relay::{Direction, InboundMessage, OutboundMessage, Presentation};
use gatehouse_core::transcript::{Side, TranscriptLine};
use gatehouse_core::types::DbId;
use gatehouse_db::models::ticket::{CreateMessageMapping, Ticket};
use gatehouse_db::repositories::{CaseRepo, MessageMappingRepo, TicketRepo};
use gatehouse_db::DbPool;
use serde::Serialize;

use crate::claims::ClaimManager;
use crate::collaborators::Collaborators;
use crate::config::BridgeConfig;
use crate::error::ReviewResult;
use crate::notices;
use crate::sets::{ForwardedSet, OpenChannelSet};
use crate::transcript::TranscriptRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// No text and no attachments.
    Empty,
    /// The router produced or already handled this message.
    Echo,
    /// No open bridge for the channel or author.
    NoBridge,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    Delivered {
        ticket_id: DbId,
        delivered_message_id: String,
    },
    Ignored {
        reason: IgnoreReason,
    },
    /// The other side could not be reached; staff were told in the relay
    /// channel when possible.
    Undelivered {
        ticket_id: DbId,
        reason: String,
    },
}

/// Result of a reply sent from the case view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyOutcome {
    pub delivery: Delivery,
    /// Bridge the reply was mirrored into, if one was open.
    pub ticket_id: Option<DbId>,
}

pub struct MessageRouter {
    pool: DbPool,
    collaborators: Collaborators,
    claims: ClaimManager,
    transcripts: Arc<TranscriptRecorder>,
    open_channels: Arc<OpenChannelSet>,
    forwarded: Arc<ForwardedSet>,
    config: BridgeConfig,
}

impl MessageRouter {
    pub fn new(
        pool: DbPool,
        collaborators: Collaborators,
        claims: ClaimManager,
        transcripts: Arc<TranscriptRecorder>,
        open_channels: Arc<OpenChannelSet>,
        forwarded: Arc<ForwardedSet>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            pool,
            collaborators,
            claims,
            transcripts,
            open_channels,
            forwarded,
            config,
        }
    }

    pub fn forwarded(&self) -> &Arc<ForwardedSet> {
        &self.forwarded
    }

    /// Route one inbound message in the given direction.
    pub async fn route_inbound(
        &self,
        message: &InboundMessage,
        direction: Direction,
    ) -> ReviewResult<RouteOutcome> {
        if self.forwarded.contains(&message.message_id) {
            tracing::debug!(message_id = %message.message_id, "Skipping already-forwarded message");
            return Ok(ignored(IgnoreReason::Echo));
        }
        if message.is_empty() {
            return Ok(ignored(IgnoreReason::Empty));
        }

        let outcome = match direction {
            Direction::ToApplicant => self.to_applicant(message).await?,
            Direction::ToHandler => self.to_handler(message).await?,
        };
        // Mark only delivered messages; failures stay routable.
        if matches!(outcome, RouteOutcome::Delivered { .. }) {
            self.forwarded.insert(&message.message_id);
        }
        Ok(outcome)
    }

    async fn to_applicant(&self, message: &InboundMessage) -> ReviewResult<RouteOutcome> {
        let Some(ticket) = self.ticket_for_relay(&message.channel_id).await? else {
            return Ok(ignored(IgnoreReason::NoBridge));
        };

        let private_reply = match message.reply_to_message_id.as_deref() {
            Some(id) => MessageMappingRepo::find_by_relay_id(&self.pool, id)
                .await?
                .map(|m| m.private_message_id),
            None => None,
        };

        let outbound = outbound_from(message, self.branded())
            .replying_to(private_reply.clone());
        let delivered_id = match self
            .collaborators
            .direct
            .send_direct(&ticket.applicant_id, &outbound)
            .await
        {
            Delivery::Sent { message_id } => message_id,
            Delivery::Failed { reason } => {
                tracing::warn!(ticket_id = ticket.id, reason = %reason, "Relay to applicant failed");
                self.notify_undelivered(&message.channel_id, &reason).await;
                return Ok(RouteOutcome::Undelivered {
                    ticket_id: ticket.id,
                    reason,
                });
            }
        };
        self.forwarded.insert(&delivered_id);

        let author = self
            .collaborators
            .profile_or_unknown(&ticket.workspace_id, &message.author_id)
            .await
            .display_name;
        self.record(
            &ticket,
            CreateMessageMapping {
                ticket_id: ticket.id,
                direction: Direction::ToApplicant.as_str().to_string(),
                relay_message_id: message.message_id.clone(),
                private_message_id: delivered_id.clone(),
                relay_reply_to_id: message.reply_to_message_id.clone(),
                private_reply_to_id: private_reply,
                author_name: author,
                content: message.content.clone(),
                attachment_urls: message.attachment_urls(),
            },
        )
        .await;

        Ok(RouteOutcome::Delivered {
            ticket_id: ticket.id,
            delivered_message_id: delivered_id,
        })
    }

    async fn to_handler(&self, message: &InboundMessage) -> ReviewResult<RouteOutcome> {
        let Some(ticket) = TicketRepo::find_open_for_applicant(
            &self.pool,
            message.workspace_id.as_deref(),
            &message.author_id,
        )
        .await?
        else {
            return Ok(ignored(IgnoreReason::NoBridge));
        };
        let Some(relay_channel) = ticket.channel_id.clone() else {
            return Ok(ignored(IgnoreReason::NoBridge));
        };

        let relay_reply = match message.reply_to_message_id.as_deref() {
            Some(id) => MessageMappingRepo::find_by_private_id(&self.pool, id)
                .await?
                .map(|m| m.relay_message_id),
            None => None,
        };

        let profile = self
            .collaborators
            .profile_or_unknown(&ticket.workspace_id, &message.author_id)
            .await;
        let presentation = Presentation {
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
        };
        let outbound = outbound_from(message, presentation).replying_to(relay_reply.clone());

        let relay_id = match self
            .collaborators
            .channels
            .send_message(&relay_channel, &outbound)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(ticket_id = ticket.id, error = %e, "Relay to handlers failed");
                return Ok(RouteOutcome::Undelivered {
                    ticket_id: ticket.id,
                    reason: e.to_string(),
                });
            }
        };
        self.forwarded.insert(&relay_id);

        self.record(
            &ticket,
            CreateMessageMapping {
                ticket_id: ticket.id,
                direction: Direction::ToHandler.as_str().to_string(),
                relay_message_id: relay_id.clone(),
                private_message_id: message.message_id.clone(),
                relay_reply_to_id: relay_reply,
                private_reply_to_id: message.reply_to_message_id.clone(),
                author_name: profile.display_name,
                content: message.content.clone(),
                attachment_urls: message.attachment_urls(),
            },
        )
        .await;

        Ok(RouteOutcome::Delivered {
            ticket_id: ticket.id,
            delivered_message_id: relay_id,
        })
    }

    /// Send a reply to the applicant from the case view. The acting handler
    /// must be staff and must not be blocked by someone else's claim. If a
    /// bridge is open the reply is mirrored into its relay channel.
    pub async fn reply_from_case(
        &self,
        case_id: &str,
        handler_id: &str,
        content: &str,
    ) -> ReviewResult<ReplyOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::Validation("Reply must not be empty".to_string()).into());
        }
        let case = CaseRepo::find_by_id(&self.pool, case_id)
            .await?
            .ok_or_else(|| CoreError::not_found("case", case_id))?;
        self.collaborators
            .require_staff(&case.workspace_id, handler_id)
            .await?;
        self.claims.guard(case_id, handler_id).await?;

        let outbound = OutboundMessage::text(content).with_presentation(self.branded());
        let delivery = self
            .collaborators
            .direct
            .send_direct(&case.applicant_id, &outbound)
            .await;
        let Delivery::Sent { message_id: private_id } = &delivery else {
            tracing::warn!(case_id, ?delivery, "Reply to applicant was not delivered");
            return Ok(ReplyOutcome {
                delivery,
                ticket_id: None,
            });
        };
        self.forwarded.insert(private_id);
        tracing::info!(case_id, handler_id, "Reply sent to applicant");

        let ticket = TicketRepo::find_open_for_applicant(
            &self.pool,
            Some(&case.workspace_id),
            &case.applicant_id,
        )
        .await?;
        let Some((ticket, relay_channel)) =
            ticket.and_then(|t| t.channel_id.clone().map(|c| (t, c)))
        else {
            return Ok(ReplyOutcome {
                delivery,
                ticket_id: None,
            });
        };

        let author = self
            .collaborators
            .profile_or_unknown(&case.workspace_id, handler_id)
            .await
            .display_name;
        let mirror = OutboundMessage::text(content).with_presentation(Presentation {
            display_name: author.clone(),
            avatar_url: None,
        });
        match self
            .collaborators
            .channels
            .send_message(&relay_channel, &mirror)
            .await
        {
            Ok(relay_id) => {
                self.forwarded.insert(&relay_id);
                self.record(
                    &ticket,
                    CreateMessageMapping {
                        ticket_id: ticket.id,
                        direction: Direction::ToApplicant.as_str().to_string(),
                        relay_message_id: relay_id,
                        private_message_id: private_id.clone(),
                        relay_reply_to_id: None,
                        private_reply_to_id: None,
                        author_name: author,
                        content: content.to_string(),
                        attachment_urls: Vec::new(),
                    },
                )
                .await;
            }
            Err(e) => {
                tracing::warn!(ticket_id = ticket.id, error = %e, "Could not mirror reply into relay channel");
            }
        }

        Ok(ReplyOutcome {
            delivery,
            ticket_id: Some(ticket.id),
        })
    }

    /// Open ticket for a relay channel. Channels outside the open set are
    /// not bridges and never reach the store; the set is rebuilt at startup.
    async fn ticket_for_relay(&self, channel_id: &str) -> ReviewResult<Option<Ticket>> {
        if !self.open_channels.contains(channel_id) {
            return Ok(None);
        }
        let ticket = TicketRepo::find_open_by_channel(&self.pool, channel_id).await?;
        if ticket.is_none() {
            self.open_channels.remove(channel_id);
            tracing::debug!(channel_id, "Dropped stale channel from open set");
        }
        Ok(ticket)
    }

    /// Persist the mapping and append the transcript line. The message was
    /// already delivered, so failures here are logged only.
    async fn record(&self, ticket: &Ticket, mapping: CreateMessageMapping) {
        let side = match mapping.direction.parse::<Direction>() {
            Ok(Direction::ToHandler) => Side::Applicant,
            _ => Side::Staff,
        };
        let line = TranscriptLine {
            at: Utc::now(),
            side,
            author: mapping.author_name.clone(),
            content: mapping.content.clone(),
            attachment_urls: mapping.attachment_urls.clone(),
        };
        if let Err(e) = MessageMappingRepo::upsert(&self.pool, &mapping).await {
            tracing::error!(ticket_id = ticket.id, error = %e, "Failed to record message mapping");
        }
        self.transcripts.append(ticket.id, line).await;
    }

    async fn notify_undelivered(&self, relay_channel: &str, reason: &str) {
        let notice = OutboundMessage::text(notices::undelivered_notice(reason));
        match self
            .collaborators
            .channels
            .send_message(relay_channel, &notice)
            .await
        {
            Ok(id) => {
                self.forwarded.insert(&id);
            }
            Err(e) => {
                tracing::warn!(channel_id = relay_channel, error = %e, "Could not post undelivered notice");
            }
        }
    }

    fn branded(&self) -> Presentation {
        Presentation {
            display_name: self.config.branding_name.clone(),
            avatar_url: None,
        }
    }
}

fn ignored(reason: IgnoreReason) -> RouteOutcome {
    RouteOutcome::Ignored { reason }
}

/// Carry text, the first image, and the remaining attachments as links.
fn outbound_from(message: &InboundMessage, presentation: Presentation) -> OutboundMessage {
    let image_url = message.first_image_url().map(str::to_string);
    let attachment_urls = message
        .attachment_urls()
        .into_iter()
        .filter(|url| Some(url.as_str()) != image_url.as_deref())
        .collect();
    OutboundMessage {
        content: message.content.clone(),
        presentation: Some(presentation),
        image_url,
        attachment_urls,
        reply_to_message_id: None,
    }
}
