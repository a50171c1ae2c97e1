// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record builders for tests.

use chrono::{DateTime, TimeZone, Utc};
use pulse_core::{ConversationSummary, Message, NotificationRecord, UserId};

/// Fixed reference instant (2026-01-01T00:00:00Z) plus `secs`.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + secs, 0)
        .single()
        .unwrap_or_default()
}

pub fn notification(id: &str, title: &str) -> NotificationRecord {
    NotificationRecord {
        id: id.to_string(),
        title: title.to_string(),
        message: String::new(),
        created_at: at(0),
        source_device: None,
        is_read: false,
    }
}

/// A text message from `from` to `to`, created `secs` after the reference instant.
pub fn message(id: &str, from: &str, to: &str, secs: i64) -> Message {
    Message {
        id: id.to_string(),
        sender_id: UserId::from(from),
        receiver_id: UserId::from(to),
        body: format!("body of {id}"),
        attachments: Vec::new(),
        created_at: at(secs),
    }
}

pub fn summary(peer: &str, last: Option<Message>, unread: u64) -> ConversationSummary {
    ConversationSummary {
        peer_id: UserId::from(peer),
        last_message: last,
        unread_count: unread,
    }
}

/// JSON payload of a `notification` push event.
pub fn notification_json(id: &str, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "created_at": "2026-01-01T00:00:00Z",
    })
}

/// JSON payload of a `message` push event.
pub fn message_json(id: &str, from: &str, to: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "sender_id": from,
        "receiver_id": to,
        "body": format!("body of {id}"),
        "created_at": "2026-01-01T00:00:10Z",
    })
}
