// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pulse sync core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use pulse_core::DeviceClass;
use serde::{Deserialize, Serialize};

/// Top-level Pulse configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PulseConfig {
    /// Identity and logging of the local session.
    #[serde(default)]
    pub session: SessionConfig,

    /// Push channel settings.
    #[serde(default)]
    pub push: PushConfig,

    /// Remote authority (HTTP API) settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Poll cadence of the synchronizers.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Notification feed settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Attachment submission limits.
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Identity and logging of the local session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// User to register as. Can also be passed on the command line.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Device class announced at registration.
    #[serde(default)]
    pub device_class: DeviceClass,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            device_class: DeviceClass::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Push channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    /// WebSocket endpoint of the push broker.
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,

    /// How long to wait for the registration ack after the channel opens.
    #[serde(default = "default_registration_timeout_secs")]
    pub registration_timeout_secs: u64,
}

impl PushConfig {
    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: default_push_endpoint(),
            registration_timeout_secs: default_registration_timeout_secs(),
        }
    }
}

fn default_push_endpoint() -> String {
    "ws://127.0.0.1:3000/push".to_string()
}

fn default_registration_timeout_secs() -> u64 {
    10
}

/// Remote authority configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL the REST paths are appended to.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Poll cadence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Notification feed poll interval.
    #[serde(default = "default_notification_interval_secs")]
    pub notification_interval_secs: u64,

    /// Active conversation poll interval.
    #[serde(default = "default_conversation_interval_secs")]
    pub conversation_interval_secs: u64,
}

impl PollingConfig {
    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_secs)
    }

    pub fn conversation_interval(&self) -> Duration {
        Duration::from_secs(self.conversation_interval_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            notification_interval_secs: default_notification_interval_secs(),
            conversation_interval_secs: default_conversation_interval_secs(),
        }
    }
}

fn default_notification_interval_secs() -> u64 {
    60
}

fn default_conversation_interval_secs() -> u64 {
    5
}

/// Notification feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    /// Maximum number of cached notifications.
    #[serde(default = "default_feed_capacity")]
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: default_feed_capacity(),
        }
    }
}

fn default_feed_capacity() -> usize {
    50
}

/// Attachment submission limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum number of files in one bundle.
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,

    /// Maximum size of a single file in bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attachments: default_max_attachments(),
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

fn default_max_attachments() -> usize {
    10
}

fn default_max_attachment_bytes() -> u64 {
    25 * 1024 * 1024
}
