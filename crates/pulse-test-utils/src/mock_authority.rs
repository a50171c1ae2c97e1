// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable remote authority for deterministic testing.
//!
//! `MockAuthority` implements `RemoteAuthority` over in-memory state and
//! records every call for assertion in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::{
    AdapterType, ConversationSummary, DeviceClass, HealthStatus, Message, NotificationPage,
    NotificationRecord, OutgoingMessage, PluginAdapter, PresenceStatus, PulseError,
    RemoteAuthority, UploadBundle, UserId,
};

use crate::fixtures;

/// One recorded call against the authority.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorityCall {
    FetchNotifications(UserId),
    MarkAllNotificationsRead(UserId),
    MarkNotificationRead(String),
    FetchConversation { self_id: UserId, peer_id: UserId },
    FetchConversations(UserId),
    SendMessage { receiver_id: UserId, body: String },
    SendWithAttachments { receiver_id: UserId, files: usize },
    MarkConversationRead { sender_id: UserId, receiver_id: UserId },
    UnreadMessageCount(UserId),
    AnnouncePresence { user: UserId, online: bool },
    FetchPresence(UserId),
}

impl AuthorityCall {
    pub fn is_fetch_conversation(&self) -> bool {
        matches!(self, AuthorityCall::FetchConversation { .. })
    }

    pub fn is_fetch_notifications(&self) -> bool {
        matches!(self, AuthorityCall::FetchNotifications(_))
    }
}

#[derive(Default)]
struct State {
    page: NotificationPage,
    conversations: HashMap<UserId, Vec<Message>>,
    summaries: Vec<ConversationSummary>,
    unread_messages: u64,
    presence: HashMap<UserId, PresenceStatus>,
    fail_polls: bool,
    fail_writes: bool,
    reject_uploads: bool,
    conversation_delay: Duration,
    sent: usize,
    calls: Vec<AuthorityCall>,
}

/// An in-memory remote authority.
#[derive(Default)]
pub struct MockAuthority {
    state: Mutex<State>,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_notifications(&self, items: Vec<NotificationRecord>, total_unread: u64) {
        self.state().page = NotificationPage {
            items,
            total_unread,
        };
    }

    pub fn set_conversation(&self, peer: &str, messages: Vec<Message>) {
        self.state()
            .conversations
            .insert(UserId::from(peer), messages);
    }

    pub fn set_summaries(&self, summaries: Vec<ConversationSummary>) {
        self.state().summaries = summaries;
    }

    pub fn set_unread_messages(&self, count: u64) {
        self.state().unread_messages = count;
    }

    pub fn set_presence(&self, user: &str, online: bool, device: Option<DeviceClass>) {
        let user = UserId::from(user);
        self.state().presence.insert(
            user.clone(),
            PresenceStatus {
                user_id: user,
                is_online: online,
                device_class: device,
            },
        );
    }

    /// Makes every fetch fail with a poll error.
    pub fn fail_polls(&self, fail: bool) {
        self.state().fail_polls = fail;
    }

    /// Makes every write (send, mark-read, announce) fail with a request error.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Makes attachment submissions fail with an upload error.
    pub fn reject_uploads(&self, reject: bool) {
        self.state().reject_uploads = reject;
    }

    /// Holds every conversation fetch for `delay` after it is recorded.
    pub fn delay_conversation_fetches(&self, delay: Duration) {
        self.state().conversation_delay = delay;
    }

    pub fn calls(&self) -> Vec<AuthorityCall> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&AuthorityCall) -> bool) -> usize {
        self.state().calls.iter().filter(|&call| predicate(call)).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, call: AuthorityCall) -> Result<MutexGuard<'_, State>, PulseError> {
        let mut state = self.state();
        state.calls.push(call);
        if state.fail_polls {
            return Err(PulseError::poll("mock authority unavailable"));
        }
        Ok(state)
    }

    fn write(&self, call: AuthorityCall) -> Result<MutexGuard<'_, State>, PulseError> {
        let mut state = self.state();
        state.calls.push(call);
        if state.fail_writes {
            return Err(PulseError::request("mock authority rejected the write"));
        }
        Ok(state)
    }
}

/// Appends a stored copy of a submitted message to the peer's conversation.
fn store(state: &mut State, sender: &UserId, receiver: &UserId, body: &str) -> Message {
    state.sent += 1;
    let mut stored = fixtures::message(
        &format!("sent-{}", state.sent),
        sender.as_str(),
        receiver.as_str(),
        1_000 + state.sent as i64,
    );
    stored.body = body.to_string();
    state
        .conversations
        .entry(receiver.clone())
        .or_default()
        .push(stored.clone());
    stored
}

#[async_trait]
impl PluginAdapter for MockAuthority {
    fn name(&self) -> &str {
        "mock-authority"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RemoteAuthority
    }

    async fn health_check(&self) -> Result<HealthStatus, PulseError> {
        if self.state().fail_polls {
            return Ok(HealthStatus::Degraded("polls failing".to_string()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PulseError> {
        Ok(())
    }
}

#[async_trait]
impl RemoteAuthority for MockAuthority {
    async fn fetch_notifications(&self, user: &UserId) -> Result<NotificationPage, PulseError> {
        let state = self.read(AuthorityCall::FetchNotifications(user.clone()))?;
        Ok(state.page.clone())
    }

    async fn mark_all_notifications_read(&self, user: &UserId) -> Result<(), PulseError> {
        let mut state = self.write(AuthorityCall::MarkAllNotificationsRead(user.clone()))?;
        state.page.total_unread = 0;
        state.page.items.iter_mut().for_each(|n| n.is_read = true);
        Ok(())
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), PulseError> {
        let mut state = self.write(AuthorityCall::MarkNotificationRead(
            notification_id.to_string(),
        ))?;
        let page = &mut state.page;
        if let Some(record) = page
            .items
            .iter_mut()
            .find(|n| n.id == notification_id && !n.is_read)
        {
            record.is_read = true;
            page.total_unread = page.total_unread.saturating_sub(1);
        }
        Ok(())
    }

    async fn fetch_conversation(
        &self,
        self_id: &UserId,
        peer_id: &UserId,
    ) -> Result<Vec<Message>, PulseError> {
        let (messages, delay) = {
            let state = self.read(AuthorityCall::FetchConversation {
                self_id: self_id.clone(),
                peer_id: peer_id.clone(),
            })?;
            let messages = state.conversations.get(peer_id).cloned().unwrap_or_default();
            (messages, state.conversation_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(messages)
    }

    async fn fetch_conversations(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConversationSummary>, PulseError> {
        let state = self.read(AuthorityCall::FetchConversations(user.clone()))?;
        Ok(state.summaries.clone())
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, PulseError> {
        let mut state = self.write(AuthorityCall::SendMessage {
            receiver_id: message.receiver_id.clone(),
            body: message.body.clone(),
        })?;
        Ok(store(
            &mut state,
            &message.sender_id,
            &message.receiver_id,
            &message.body,
        ))
    }

    async fn send_message_with_attachments(
        &self,
        bundle: &UploadBundle,
    ) -> Result<Message, PulseError> {
        let mut state = self.state();
        state.calls.push(AuthorityCall::SendWithAttachments {
            receiver_id: bundle.receiver_id.clone(),
            files: bundle.files.len(),
        });
        if state.reject_uploads {
            return Err(PulseError::upload("mock authority rejected the bundle"));
        }
        Ok(store(
            &mut state,
            &bundle.sender_id,
            &bundle.receiver_id,
            &bundle.body,
        ))
    }

    async fn mark_conversation_read(
        &self,
        sender_id: &UserId,
        receiver_id: &UserId,
    ) -> Result<(), PulseError> {
        self.write(AuthorityCall::MarkConversationRead {
            sender_id: sender_id.clone(),
            receiver_id: receiver_id.clone(),
        })?;
        Ok(())
    }

    async fn unread_message_count(&self, user: &UserId) -> Result<u64, PulseError> {
        let state = self.read(AuthorityCall::UnreadMessageCount(user.clone()))?;
        Ok(state.unread_messages)
    }

    async fn announce_presence(&self, user: &UserId, online: bool) -> Result<(), PulseError> {
        self.write(AuthorityCall::AnnouncePresence {
            user: user.clone(),
            online,
        })?;
        Ok(())
    }

    async fn fetch_presence(&self, user: &UserId) -> Result<PresenceStatus, PulseError> {
        let state = self.read(AuthorityCall::FetchPresence(user.clone()))?;
        Ok(state
            .presence
            .get(user)
            .cloned()
            .unwrap_or_else(|| PresenceStatus {
                user_id: user.clone(),
                is_online: false,
                device_class: None,
            }))
    }
}
