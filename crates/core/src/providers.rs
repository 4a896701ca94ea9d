//! Narrow interfaces to the host platform.
//!
//! The review services never talk to the messaging platform directly; they
//! go through these traits. The API crate implements them over HTTP against
//! the gateway, and tests use in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::relay::OutboundMessage;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform refused the operation for lack of permissions.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider error: {0}")]
    Other(String),
}

/// Basic profile of a platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Profile used when the identity provider cannot resolve a user.
    pub fn unknown(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: format!("user-{user_id}"),
            avatar_url: None,
        }
    }
}

/// A message recently posted in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentMessage {
    pub message_id: String,
    pub content: String,
    /// Posted by this service rather than a human.
    #[serde(default)]
    pub from_service: bool,
}

/// Result of a direct message. Delivery failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Sent { message_id: String },
    Failed { reason: String },
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Sent { message_id } => Some(message_id),
            Self::Failed { .. } => None,
        }
    }
}

/// Staff authority and user profiles.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn is_staff(&self, workspace_id: &str, user_id: &str) -> Result<bool, ProviderError>;

    async fn profile(&self, workspace_id: &str, user_id: &str)
        -> Result<UserProfile, ProviderError>;
}

/// Workspace membership side effects of decisions.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn grant_membership(
        &self,
        workspace_id: &str,
        applicant_id: &str,
    ) -> Result<(), ProviderError>;

    async fn remove_member(
        &self,
        workspace_id: &str,
        applicant_id: &str,
        reason: Option<&str>,
    ) -> Result<(), ProviderError>;
}

/// Relay channels and the messages posted in them.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Create a staff-only channel, returning its id.
    async fn create_relay_channel(
        &self,
        workspace_id: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<String, ProviderError>;

    async fn grant_handler_access(&self, channel_id: &str) -> Result<(), ProviderError>;

    /// Post a message, returning its id.
    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<String, ProviderError>;

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<RecentMessage>, ProviderError>;

    async fn delete_channel(&self, channel_id: &str) -> Result<(), ProviderError>;

    async fn lock_and_archive(&self, channel_id: &str) -> Result<(), ProviderError>;

    /// Attach a text file to a new message, returning the message id.
    async fn upload_transcript(
        &self,
        channel_id: &str,
        filename: &str,
        body: &str,
        caption: &str,
    ) -> Result<String, ProviderError>;
}

/// One-way private messages to applicants.
#[async_trait]
pub trait DirectMessageProvider: Send + Sync {
    async fn send_direct(&self, user_id: &str, message: &OutboundMessage) -> Delivery;
}

/// Re-renders the staff-facing view of a case.
#[async_trait]
pub trait CasePresenter: Send + Sync {
    async fn refresh(&self, case_id: &str) -> Result<(), ProviderError>;
}
