// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP remote authority adapter for the Pulse sync core.
//!
//! This crate implements [`RemoteAuthority`] over the authority's REST API:
//! notification polling and mark-read, conversation fetches, message sends
//! (plain and multipart), and presence announce/lookup.

pub mod client;
pub mod types;

use async_trait::async_trait;
use pulse_config::model::ApiConfig;
use pulse_core::traits::{PluginAdapter, RemoteAuthority};
use pulse_core::{
    AdapterType, ConversationSummary, HealthStatus, Message, NotificationPage, OutgoingMessage,
    PresenceStatus, PulseError, UploadBundle, UserId,
};
use tracing::{debug, info};

use crate::client::ApiClient;

/// Remote authority reached over HTTP.
pub struct HttpAuthority {
    client: ApiClient,
}

impl HttpAuthority {
    /// Creates the authority client from the `[api]` configuration section.
    pub fn new(config: &ApiConfig) -> Result<Self, PulseError> {
        let client = ApiClient::new(config.base_url.clone(), config.request_timeout())?;
        info!(base_url = %config.base_url, "remote authority client initialized");
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl PluginAdapter for HttpAuthority {
    fn name(&self) -> &str {
        "http-authority"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RemoteAuthority
    }

    async fn health_check(&self) -> Result<HealthStatus, PulseError> {
        // The authority exposes no health endpoint; a constructed client is healthy.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PulseError> {
        debug!("remote authority client shutting down");
        Ok(())
    }
}

#[async_trait]
impl RemoteAuthority for HttpAuthority {
    async fn fetch_notifications(&self, user: &UserId) -> Result<NotificationPage, PulseError> {
        self.client.fetch_notifications(user).await
    }

    async fn mark_all_notifications_read(&self, user: &UserId) -> Result<(), PulseError> {
        self.client.mark_all_notifications_read(user).await
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), PulseError> {
        self.client.mark_notification_read(notification_id).await
    }

    async fn fetch_conversation(
        &self,
        self_id: &UserId,
        peer_id: &UserId,
    ) -> Result<Vec<Message>, PulseError> {
        self.client.fetch_conversation(self_id, peer_id).await
    }

    async fn fetch_conversations(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConversationSummary>, PulseError> {
        self.client.fetch_conversations(user).await
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, PulseError> {
        self.client.send_message(message).await
    }

    async fn send_message_with_attachments(
        &self,
        bundle: &UploadBundle,
    ) -> Result<Message, PulseError> {
        self.client.send_message_with_attachments(bundle).await
    }

    async fn mark_conversation_read(
        &self,
        sender_id: &UserId,
        receiver_id: &UserId,
    ) -> Result<(), PulseError> {
        self.client.mark_conversation_read(sender_id, receiver_id).await
    }

    async fn unread_message_count(&self, user: &UserId) -> Result<u64, PulseError> {
        self.client.unread_message_count(user).await
    }

    async fn announce_presence(&self, user: &UserId, online: bool) -> Result<(), PulseError> {
        self.client.announce_presence(user, online).await
    }

    async fn fetch_presence(&self, user: &UserId) -> Result<PresenceStatus, PulseError> {
        self.client.fetch_presence(user).await
    }
}
