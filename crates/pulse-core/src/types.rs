// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the adapters, the event bus, and the synchronizers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier of a user (self or peer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

/// Class of device a session runs on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
    Tablet,
    Web,
}

/// The identity a session registers with the push broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub user_id: UserId,
    pub device: DeviceClass,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, device: DeviceClass) -> Self {
        Self {
            user_id: user_id.into(),
            device,
        }
    }
}

/// Lifecycle state of the push channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Registered,
}

/// A single push channel frame: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PushFrame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// A notification as held in the bounded feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// Pushes may omit the timestamp; such records are stamped on receipt.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "device")]
    pub source_device: Option<String>,
    #[serde(default)]
    pub is_read: bool,
}

/// A poll snapshot of the notification feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage {
    #[serde(alias = "data")]
    pub items: Vec<NotificationRecord>,
    pub total_unread: u64,
}

/// Metadata of an attachment stored by the remote authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A stored message, as returned by the remote authority or a push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(default, alias = "content")]
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Returns the other party of this message from `self_id`'s point of view.
    pub fn peer_of(&self, self_id: &UserId) -> Option<&UserId> {
        if &self.sender_id == self_id {
            Some(&self.receiver_id)
        } else if &self.receiver_id == self_id {
            Some(&self.sender_id)
        } else {
            None
        }
    }
}

/// A text-only message submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
}

/// A file to be submitted with a message.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// Message text plus attachments, submitted as one multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadBundle {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
    pub files: Vec<UploadFile>,
}

impl UploadBundle {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.data.len() as u64).sum()
    }
}

/// Summary row of the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub peer_id: UserId,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u64,
}

/// A peer's last known presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub peer_id: UserId,
    pub device_class: Option<DeviceClass>,
    pub is_online: bool,
}

/// Payload of `presence_up` / `presence_down` push events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    #[serde(alias = "user_id")]
    pub peer_id: UserId,
    #[serde(default)]
    pub device_class: Option<DeviceClass>,
}

/// Presence status as reported by `GET /messages/status/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceStatus {
    pub user_id: UserId,
    pub is_online: bool,
    #[serde(default)]
    pub device_class: Option<DeviceClass>,
}

/// What a `sync` push event asks the other devices of a user to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    NotificationsRead,
    MessagesRead,
    Refresh,
}

/// Payload of the `sync` push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub kind: SyncKind,
    #[serde(default)]
    pub peer_id: Option<UserId>,
    #[serde(default)]
    pub source_device: Option<String>,
}

/// A non-negative unread count that floors at zero on decrement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnreadCounter(u64);

impl UnreadCounter {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    pub fn decrement(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    pub fn set(&mut self, value: u64) {
        self.0 = value;
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    PushTransport,
    RemoteAuthority,
}
