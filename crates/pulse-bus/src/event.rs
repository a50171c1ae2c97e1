// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of payloads carried by the registry.

use pulse_core::PulseError;
use pulse_core::types::{Message, NotificationRecord, PresenceEvent, SyncEvent, UserId};

use crate::topic::Topic;

/// Events raised by the connection itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Registration was acknowledged by the broker.
    Connected { user_id: UserId },
    /// The channel was closed, by us or by the broker.
    Disconnected { reason: String },
    /// A transport failure forced the connection down.
    Error { message: String },
}

/// Every payload a subscriber can receive. The topic follows from the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Notification(NotificationRecord),
    Message(Message),
    Sync(SyncEvent),
    PresenceUp(PresenceEvent),
    PresenceDown(PresenceEvent),
    Transport(TransportEvent),
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::Notification(_) => Topic::Notification,
            BusEvent::Message(_) => Topic::Message,
            BusEvent::Sync(_) => Topic::Sync,
            BusEvent::PresenceUp(_) => Topic::PresenceUp,
            BusEvent::PresenceDown(_) => Topic::PresenceDown,
            BusEvent::Transport(TransportEvent::Connected { .. }) => Topic::Connect,
            BusEvent::Transport(TransportEvent::Disconnected { .. }) => Topic::Disconnect,
            BusEvent::Transport(TransportEvent::Error { .. }) => Topic::Error,
        }
    }

    /// Decodes the JSON payload of an inbound push frame for a reserved topic.
    pub fn decode(topic: Topic, data: serde_json::Value) -> Result<BusEvent, PulseError> {
        let decode_err = |e: serde_json::Error| PulseError::Transport {
            message: format!("malformed `{topic}` payload: {e}"),
            source: Some(Box::new(e)),
        };

        match topic {
            Topic::Notification => serde_json::from_value(data)
                .map(BusEvent::Notification)
                .map_err(decode_err),
            Topic::Message => serde_json::from_value(data)
                .map(BusEvent::Message)
                .map_err(decode_err),
            Topic::Sync => serde_json::from_value(data)
                .map(BusEvent::Sync)
                .map_err(decode_err),
            Topic::PresenceUp => serde_json::from_value(data)
                .map(BusEvent::PresenceUp)
                .map_err(decode_err),
            Topic::PresenceDown => serde_json::from_value(data)
                .map(BusEvent::PresenceDown)
                .map_err(decode_err),
            Topic::Connect | Topic::Disconnect | Topic::Error => Err(PulseError::transport(
                format!("`{topic}` is raised locally and cannot arrive from the broker"),
            )),
        }
    }
}
