//! Message shapes exchanged with the host platform over a bridge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Which way a message travels across the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Posted by staff in the relay channel, delivered to the applicant.
    ToApplicant,
    /// Sent by the applicant privately, delivered into the relay channel.
    ToHandler,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToApplicant => "to_applicant",
            Self::ToHandler => "to_handler",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to_applicant" => Ok(Self::ToApplicant),
            "to_handler" => Ok(Self::ToHandler),
            other => Err(CoreError::Validation(format!("Unknown direction '{other}'"))),
        }
    }
}

/// A file attached to a platform message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    /// Images are detected by content type, falling back to the file extension.
    pub fn is_image(&self) -> bool {
        if let Some(ct) = &self.content_type {
            return ct.starts_with("image/");
        }
        let name = self.filename.as_deref().unwrap_or(&self.url);
        let name = name.split(['?', '#']).next().unwrap_or(name).to_ascii_lowercase();
        [".png", ".jpg", ".jpeg", ".gif", ".webp"]
            .iter()
            .any(|ext| name.ends_with(ext))
    }
}

/// A message observed by the gateway and handed to the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: String,
    /// Relay channel id for staff messages, private channel id for applicant messages.
    pub channel_id: String,
    pub author_id: String,
    /// Set when the applicant's workspace is known (staff messages always know it).
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_to_message_id: Option<String>,
}

impl InboundMessage {
    /// No text and no attachments.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachments.is_empty()
    }

    /// URL of the first image attachment, if any.
    pub fn first_image_url(&self) -> Option<&str> {
        self.attachments
            .iter()
            .find(|a| a.is_image())
            .map(|a| a.url.as_str())
    }

    pub fn attachment_urls(&self) -> Vec<String> {
        self.attachments.iter().map(|a| a.url.clone()).collect()
    }
}

/// Display identity a relayed message is posted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A message the router asks the platform to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: String,
    pub presentation: Option<Presentation>,
    pub image_url: Option<String>,
    /// Other attachment URLs carried along as links.
    pub attachment_urls: Vec<String>,
    pub reply_to_message_id: Option<String>,
}

impl OutboundMessage {
    /// Plain text message with no identity override.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            presentation: None,
            image_url: None,
            attachment_urls: Vec::new(),
            reply_to_message_id: None,
        }
    }

    pub fn with_presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = Some(presentation);
        self
    }

    pub fn replying_to(mut self, message_id: Option<String>) -> Self {
        self.reply_to_message_id = message_id;
        self
    }
}
