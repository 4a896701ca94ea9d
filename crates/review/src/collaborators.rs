//! The set of platform collaborators the services are built from.

use std::sync::Arc;

use gatehouse_core::error::CoreError;
use gatehouse_core::providers::{
    ChannelProvider, DirectMessageProvider, IdentityProvider, MembershipProvider, UserProfile,
};

use crate::error::ReviewResult;

#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub membership: Arc<dyn MembershipProvider>,
    pub channels: Arc<dyn ChannelProvider>,
    pub direct: Arc<dyn DirectMessageProvider>,
}

impl Collaborators {
    /// Use one gateway object for every role.
    pub fn from_gateway<G>(gateway: Arc<G>) -> Self
    where
        G: IdentityProvider + MembershipProvider + ChannelProvider + DirectMessageProvider + 'static,
    {
        Self {
            identity: gateway.clone(),
            membership: gateway.clone(),
            channels: gateway.clone(),
            direct: gateway,
        }
    }

    /// Fail with `Forbidden` unless `user_id` has staff authority in the
    /// workspace.
    pub async fn require_staff(&self, workspace_id: &str, user_id: &str) -> ReviewResult<()> {
        if self.identity.is_staff(workspace_id, user_id).await? {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!("<@{user_id}> is not staff in this workspace")).into())
        }
    }

    /// Profile for display purposes; falls back to a placeholder on failure.
    pub async fn profile_or_unknown(&self, workspace_id: &str, user_id: &str) -> UserProfile {
        match self.identity.profile(workspace_id, user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Profile lookup failed, using placeholder");
                UserProfile::unknown(user_id)
            }
        }
    }
}
