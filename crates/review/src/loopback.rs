//! In-memory gateway implementing every collaborator trait.
//!
//! Records each call so tests (and local runs without a platform gateway)
//! can inspect what the services asked for. Failures can be switched on per
//! operation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use gatehouse_core::providers::{
    CasePresenter, ChannelProvider, Delivery, DirectMessageProvider, IdentityProvider,
    MembershipProvider, ProviderError, RecentMessage, UserProfile,
};
use gatehouse_core::relay::OutboundMessage;

/// A relay channel created through the gateway.
#[derive(Debug, Clone, Default)]
pub struct LoopbackChannel {
    pub workspace_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub handler_access: bool,
    pub archived: bool,
    pub messages: Vec<(String, OutboundMessage)>,
}

/// A transcript attached through the gateway.
#[derive(Debug, Clone)]
pub struct LoopbackUpload {
    pub channel_id: String,
    pub filename: String,
    pub body: String,
    pub caption: String,
    pub message_id: String,
}

/// Which operations fail.
#[derive(Debug, Clone, Default)]
pub struct FailureSwitches {
    pub create_channel: bool,
    pub grant_access: bool,
    pub delete_channel: bool,
    pub archive_channel: bool,
    pub upload: bool,
    pub membership: bool,
    /// Users whose direct messages fail.
    pub direct_to: HashSet<String>,
}

#[derive(Debug, Default)]
struct State {
    all_staff: bool,
    staff: HashSet<String>,
    profiles: HashMap<String, UserProfile>,
    channels: HashMap<String, LoopbackChannel>,
    created_channels: usize,
    deleted_channels: Vec<String>,
    direct: Vec<(String, String, OutboundMessage)>,
    uploads: Vec<LoopbackUpload>,
    granted: Vec<(String, String)>,
    removed: Vec<(String, String, Option<String>)>,
    refreshed: Vec<String>,
    failures: FailureSwitches,
}

pub struct LoopbackGateway {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl Default for LoopbackGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackGateway {
    /// Every user is staff.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                all_staff: true,
                ..State::default()
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Only the listed users are staff.
    pub fn with_staff<I, S>(staff: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gateway = Self::new();
        {
            let mut state = gateway.lock();
            state.all_staff = false;
            state.staff = staff.into_iter().map(Into::into).collect();
        }
        gateway
    }

    pub fn set_profile(&self, user_id: &str, display_name: &str) {
        self.lock().profiles.insert(
            user_id.to_string(),
            UserProfile {
                user_id: user_id.to_string(),
                display_name: display_name.to_string(),
                avatar_url: None,
            },
        );
    }

    pub fn set_failures(&self, failures: FailureSwitches) {
        self.lock().failures = failures;
    }

    pub fn fail_direct_to(&self, user_id: &str) {
        self.lock().failures.direct_to.insert(user_id.to_string());
    }

    pub fn channel(&self, channel_id: &str) -> Option<LoopbackChannel> {
        self.lock().channels.get(channel_id).cloned()
    }

    /// Messages posted to a channel, oldest first.
    pub fn channel_messages(&self, channel_id: &str) -> Vec<OutboundMessage> {
        self.lock()
            .channels
            .get(channel_id)
            .map(|c| c.messages.iter().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default()
    }

    /// Direct messages delivered to a user, oldest first.
    pub fn direct_messages(&self, user_id: &str) -> Vec<OutboundMessage> {
        self.lock()
            .direct
            .iter()
            .filter(|(to, _, _)| to == user_id)
            .map(|(_, _, m)| m.clone())
            .collect()
    }

    pub fn created_channel_count(&self) -> usize {
        self.lock().created_channels
    }

    pub fn live_channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    pub fn deleted_channels(&self) -> Vec<String> {
        self.lock().deleted_channels.clone()
    }

    pub fn uploads(&self) -> Vec<LoopbackUpload> {
        self.lock().uploads.clone()
    }

    pub fn granted(&self) -> Vec<(String, String)> {
        self.lock().granted.clone()
    }

    pub fn removed(&self) -> Vec<(String, String, Option<String>)> {
        self.lock().removed.clone()
    }

    pub fn refreshed(&self) -> Vec<String> {
        self.lock().refreshed.clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl IdentityProvider for LoopbackGateway {
    async fn is_staff(&self, _workspace_id: &str, user_id: &str) -> Result<bool, ProviderError> {
        let state = self.lock();
        Ok(state.all_staff || state.staff.contains(user_id))
    }

    async fn profile(&self, _workspace_id: &str, user_id: &str) -> Result<UserProfile, ProviderError> {
        Ok(self
            .lock()
            .profiles
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserProfile {
                user_id: user_id.to_string(),
                display_name: format!("user-{user_id}"),
                avatar_url: None,
            }))
    }
}

#[async_trait]
impl MembershipProvider for LoopbackGateway {
    async fn grant_membership(&self, workspace_id: &str, applicant_id: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if state.failures.membership {
            return Err(ProviderError::PermissionDenied("cannot grant membership".to_string()));
        }
        state
            .granted
            .push((workspace_id.to_string(), applicant_id.to_string()));
        Ok(())
    }

    async fn remove_member(
        &self,
        workspace_id: &str,
        applicant_id: &str,
        reason: Option<&str>,
    ) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if state.failures.membership {
            return Err(ProviderError::PermissionDenied("cannot remove member".to_string()));
        }
        state.removed.push((
            workspace_id.to_string(),
            applicant_id.to_string(),
            reason.map(str::to_string),
        ));
        Ok(())
    }
}

#[async_trait]
impl ChannelProvider for LoopbackGateway {
    async fn create_relay_channel(
        &self,
        workspace_id: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<String, ProviderError> {
        // Let concurrent opens interleave like a real network call would.
        tokio::task::yield_now().await;
        if self.lock().failures.create_channel {
            return Err(ProviderError::Unavailable("channel creation disabled".to_string()));
        }
        let id = self.next_id("chan");
        let mut state = self.lock();
        state.created_channels += 1;
        state.channels.insert(
            id.clone(),
            LoopbackChannel {
                workspace_id: workspace_id.to_string(),
                parent_id: parent_id.map(str::to_string),
                name: name.to_string(),
                ..LoopbackChannel::default()
            },
        );
        Ok(id)
    }

    async fn grant_handler_access(&self, channel_id: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if state.failures.grant_access {
            return Err(ProviderError::PermissionDenied("cannot edit permissions".to_string()));
        }
        let channel = state
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| ProviderError::NotFound(channel_id.to_string()))?;
        channel.handler_access = true;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<String, ProviderError> {
        let id = self.next_id("msg");
        let mut state = self.lock();
        let channel = state
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| ProviderError::NotFound(channel_id.to_string()))?;
        channel.messages.push((id.clone(), message.clone()));
        Ok(id)
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<RecentMessage>, ProviderError> {
        let state = self.lock();
        let channel = state
            .channels
            .get(channel_id)
            .ok_or_else(|| ProviderError::NotFound(channel_id.to_string()))?;
        Ok(channel
            .messages
            .iter()
            .rev()
            .take(limit)
            .map(|(id, m)| RecentMessage {
                message_id: id.clone(),
                content: m.content.clone(),
                from_service: true,
            })
            .collect())
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if state.failures.delete_channel {
            return Err(ProviderError::PermissionDenied("missing manage-channels".to_string()));
        }
        if state.channels.remove(channel_id).is_none() {
            return Err(ProviderError::NotFound(channel_id.to_string()));
        }
        state.deleted_channels.push(channel_id.to_string());
        Ok(())
    }

    async fn lock_and_archive(&self, channel_id: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if state.failures.archive_channel {
            return Err(ProviderError::PermissionDenied("cannot archive".to_string()));
        }
        let channel = state
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| ProviderError::NotFound(channel_id.to_string()))?;
        channel.archived = true;
        Ok(())
    }

    async fn upload_transcript(
        &self,
        channel_id: &str,
        filename: &str,
        body: &str,
        caption: &str,
    ) -> Result<String, ProviderError> {
        if self.lock().failures.upload {
            return Err(ProviderError::Unavailable("uploads disabled".to_string()));
        }
        let message_id = self.next_id("upload");
        self.lock().uploads.push(LoopbackUpload {
            channel_id: channel_id.to_string(),
            filename: filename.to_string(),
            body: body.to_string(),
            caption: caption.to_string(),
            message_id: message_id.clone(),
        });
        Ok(message_id)
    }
}

#[async_trait]
impl DirectMessageProvider for LoopbackGateway {
    async fn send_direct(&self, user_id: &str, message: &OutboundMessage) -> Delivery {
        let mut state = self.lock();
        if state.failures.direct_to.contains(user_id) {
            return Delivery::Failed {
                reason: "recipient does not accept direct messages".to_string(),
            };
        }
        let message_id = self.next_id("dm");
        state
            .direct
            .push((user_id.to_string(), message_id.clone(), message.clone()));
        Delivery::Sent { message_id }
    }
}

#[async_trait]
impl CasePresenter for LoopbackGateway {
    async fn refresh(&self, case_id: &str) -> Result<(), ProviderError> {
        self.lock().refreshed.push(case_id.to_string());
        Ok(())
    }
}
