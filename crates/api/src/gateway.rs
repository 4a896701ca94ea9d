//! HTTP client for the platform gateway.
//!
//! The gateway is the process that holds the chat-platform session. It
//! exposes the handful of platform operations the review services need as a
//! small REST API, and [`HttpGateway`] implements the collaborator traits on
//! top of it with [`reqwest`].

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_core::providers::{
    CasePresenter, ChannelProvider, Delivery, DirectMessageProvider, IdentityProvider,
    MembershipProvider, ProviderError, RecentMessage, UserProfile,
};
use gatehouse_core::relay::OutboundMessage;
use gatehouse_review::{Collaborators, LoopbackGateway};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::GatewayConfig;

/// Client for one gateway instance.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StaffResponse {
    is_staff: bool,
}

#[derive(Debug, Deserialize)]
struct ChannelCreated {
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct MessagePosted {
    message_id: String,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] (and its connection pool).
    pub fn with_client(client: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ---- private helpers ----

    /// Send a request and fail on a non-2xx status.
    async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }

    async fn send_json<T: DeserializeOwned>(
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        Self::send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Other(format!("Malformed gateway response: {e}")))
    }
}

/// Map a failed HTTP status to the provider error the services act on.
///
/// 403 becomes `PermissionDenied`, which drives the channel close fallback.
pub fn status_error(status: StatusCode, body: String) -> ProviderError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    match status {
        StatusCode::NOT_FOUND => ProviderError::NotFound(detail),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => ProviderError::PermissionDenied(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::Unavailable(detail),
        s if s.is_server_error() => ProviderError::Unavailable(detail),
        _ => ProviderError::Other(detail),
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable(format!("Gateway request failed: {err}"))
}

#[async_trait]
impl IdentityProvider for HttpGateway {
    async fn is_staff(&self, workspace_id: &str, user_id: &str) -> Result<bool, ProviderError> {
        let path = format!("/workspaces/{workspace_id}/members/{user_id}/staff");
        let response: StaffResponse =
            Self::send_json(self.request(reqwest::Method::GET, &path)).await?;
        Ok(response.is_staff)
    }

    async fn profile(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<UserProfile, ProviderError> {
        let path = format!("/workspaces/{workspace_id}/members/{user_id}");
        Self::send_json(self.request(reqwest::Method::GET, &path)).await
    }
}

#[async_trait]
impl MembershipProvider for HttpGateway {
    async fn grant_membership(
        &self,
        workspace_id: &str,
        applicant_id: &str,
    ) -> Result<(), ProviderError> {
        let path = format!("/workspaces/{workspace_id}/members/{applicant_id}/grant");
        Self::send(self.request(reqwest::Method::POST, &path)).await?;
        Ok(())
    }

    async fn remove_member(
        &self,
        workspace_id: &str,
        applicant_id: &str,
        reason: Option<&str>,
    ) -> Result<(), ProviderError> {
        let path = format!("/workspaces/{workspace_id}/members/{applicant_id}/remove");
        let body = json!({ "reason": reason });
        Self::send(self.request(reqwest::Method::POST, &path).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl ChannelProvider for HttpGateway {
    async fn create_relay_channel(
        &self,
        workspace_id: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<String, ProviderError> {
        let path = format!("/workspaces/{workspace_id}/channels");
        let body = json!({ "parent_id": parent_id, "name": name });
        let created: ChannelCreated =
            Self::send_json(self.request(reqwest::Method::POST, &path).json(&body)).await?;
        Ok(created.channel_id)
    }

    async fn grant_handler_access(&self, channel_id: &str) -> Result<(), ProviderError> {
        let path = format!("/channels/{channel_id}/handler-access");
        Self::send(self.request(reqwest::Method::POST, &path)).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<String, ProviderError> {
        let path = format!("/channels/{channel_id}/messages");
        let posted: MessagePosted =
            Self::send_json(self.request(reqwest::Method::POST, &path).json(message)).await?;
        Ok(posted.message_id)
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<RecentMessage>, ProviderError> {
        let path = format!("/channels/{channel_id}/messages");
        Self::send_json(
            self.request(reqwest::Method::GET, &path)
                .query(&[("limit", limit)]),
        )
        .await
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), ProviderError> {
        let path = format!("/channels/{channel_id}");
        Self::send(self.request(reqwest::Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn lock_and_archive(&self, channel_id: &str) -> Result<(), ProviderError> {
        let path = format!("/channels/{channel_id}/archive");
        Self::send(self.request(reqwest::Method::POST, &path)).await?;
        Ok(())
    }

    async fn upload_transcript(
        &self,
        channel_id: &str,
        filename: &str,
        body: &str,
        caption: &str,
    ) -> Result<String, ProviderError> {
        let file = reqwest::multipart::Part::text(body.to_string())
            .file_name(filename.to_string())
            .mime_str("text/plain")
            .map_err(|e| ProviderError::Other(format!("Invalid transcript part: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("caption", caption.to_string())
            .part("file", file);

        let path = format!("/channels/{channel_id}/files");
        let posted: MessagePosted =
            Self::send_json(self.request(reqwest::Method::POST, &path).multipart(form)).await?;
        Ok(posted.message_id)
    }
}

#[async_trait]
impl DirectMessageProvider for HttpGateway {
    async fn send_direct(&self, user_id: &str, message: &OutboundMessage) -> Delivery {
        let path = format!("/users/{user_id}/direct-messages");
        let result: Result<MessagePosted, ProviderError> =
            Self::send_json(self.request(reqwest::Method::POST, &path).json(message)).await;
        match result {
            Ok(posted) => Delivery::Sent {
                message_id: posted.message_id,
            },
            Err(e) => {
                tracing::debug!(user_id, error = %e, "Direct message not delivered");
                Delivery::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl CasePresenter for HttpGateway {
    async fn refresh(&self, case_id: &str) -> Result<(), ProviderError> {
        let path = format!("/cases/{case_id}/refresh");
        Self::send(self.request(reqwest::Method::POST, &path)).await?;
        Ok(())
    }
}

/// Build the collaborators and presenter the server runs against.
///
/// Without a configured gateway the in-memory [`LoopbackGateway`] is used,
/// which treats every user as staff and keeps all effects in memory.
pub fn connect(config: Option<&GatewayConfig>) -> (Collaborators, Arc<dyn CasePresenter>) {
    match config {
        Some(config) => {
            tracing::info!(url = %config.url, "Using HTTP platform gateway");
            let gateway = Arc::new(HttpGateway::new(config));
            let presenter: Arc<dyn CasePresenter> = gateway.clone();
            (Collaborators::from_gateway(gateway), presenter)
        }
        None => {
            tracing::warn!("GATEWAY_URL not set, using in-memory loopback gateway");
            let gateway = Arc::new(LoopbackGateway::new());
            let presenter: Arc<dyn CasePresenter> = gateway.clone();
            (Collaborators::from_gateway(gateway), presenter)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_forbidden_is_permission_denied() {
        assert_matches!(
            status_error(StatusCode::FORBIDDEN, "Missing Permissions".into()),
            ProviderError::PermissionDenied(msg) if msg.contains("Missing Permissions")
        );
    }

    #[test]
    fn test_status_classification() {
        assert_matches!(
            status_error(StatusCode::NOT_FOUND, String::new()),
            ProviderError::NotFound(_)
        );
        assert_matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            ProviderError::Unavailable(_)
        );
        assert_matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderError::Unavailable(_)
        );
        assert_matches!(
            status_error(StatusCode::BAD_REQUEST, "bad name".into()),
            ProviderError::Other(_)
        );
    }

    #[test]
    fn test_base_url_is_normalized() {
        let gateway = HttpGateway::new(&GatewayConfig {
            url: "http://gateway:8080/".into(),
            token: None,
        });
        assert_eq!(gateway.url("/channels/1"), "http://gateway:8080/channels/1");
    }
}
