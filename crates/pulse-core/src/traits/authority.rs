// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote authority trait: the request/response side of the backend.

use async_trait::async_trait;

use crate::error::PulseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ConversationSummary, Message, NotificationPage, OutgoingMessage, PresenceStatus,
    UploadBundle, UserId,
};

/// The subset of the backend API the sync core depends on.
///
/// Read operations fail with [`PulseError::Poll`], writes with
/// [`PulseError::Request`], attachment submissions with [`PulseError::Upload`].
#[async_trait]
pub trait RemoteAuthority: PluginAdapter {
    /// `GET /notifications?user={id}`
    async fn fetch_notifications(&self, user: &UserId) -> Result<NotificationPage, PulseError>;

    /// `PUT /notifications/read-all?user={id}`
    async fn mark_all_notifications_read(&self, user: &UserId) -> Result<(), PulseError>;

    /// `PUT /notifications/{id}/read`
    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), PulseError>;

    /// `GET /messages/conversation/{selfId}/{peerId}`
    async fn fetch_conversation(
        &self,
        self_id: &UserId,
        peer_id: &UserId,
    ) -> Result<Vec<Message>, PulseError>;

    /// `GET /messages/conversations/{id}`
    async fn fetch_conversations(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConversationSummary>, PulseError>;

    /// `POST /messages`
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, PulseError>;

    /// `POST /messages/with-attachments` (multipart, all-or-nothing)
    async fn send_message_with_attachments(
        &self,
        bundle: &UploadBundle,
    ) -> Result<Message, PulseError>;

    /// `PUT /messages/read/{senderId}/{receiverId}`
    async fn mark_conversation_read(
        &self,
        sender_id: &UserId,
        receiver_id: &UserId,
    ) -> Result<(), PulseError>;

    /// `GET /messages/unread/{id}`
    async fn unread_message_count(&self, user: &UserId) -> Result<u64, PulseError>;

    /// `PUT /messages/status/{id}`
    async fn announce_presence(&self, user: &UserId, online: bool) -> Result<(), PulseError>;

    /// `GET /messages/status/{id}`
    async fn fetch_presence(&self, user: &UserId) -> Result<PresenceStatus, PulseError>;
}
