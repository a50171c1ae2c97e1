// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named topics of the dispatch registry.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A named channel in the registry.
///
/// The string form matches the push channel event name, so inbound frames
/// map onto topics with [`std::str::FromStr`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Notification,
    Message,
    Sync,
    PresenceUp,
    PresenceDown,
    Connect,
    Disconnect,
    Error,
}

impl Topic {
    /// Topics the push channel delivers and the connection re-dispatches verbatim.
    pub const RESERVED: [Topic; 5] = [
        Topic::Notification,
        Topic::Message,
        Topic::Sync,
        Topic::PresenceUp,
        Topic::PresenceDown,
    ];

    pub fn is_reserved(&self) -> bool {
        Self::RESERVED.contains(self)
    }

    /// Transport-internal topics raised by the connection itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, Topic::Connect | Topic::Disconnect | Topic::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn topic_names_match_wire_events() {
        assert_eq!(Topic::PresenceUp.to_string(), "presence_up");
        assert_eq!(Topic::from_str("presence_down").unwrap(), Topic::PresenceDown);
        assert_eq!(Topic::from_str("notification").unwrap(), Topic::Notification);
        assert!(Topic::from_str("registered").is_err());
    }

    #[test]
    fn reserved_and_transport_topics_are_disjoint() {
        for topic in Topic::RESERVED {
            assert!(topic.is_reserved());
            assert!(!topic.is_transport());
        }
        for topic in [Topic::Connect, Topic::Disconnect, Topic::Error] {
            assert!(topic.is_transport());
            assert!(!topic.is_reserved());
        }
    }
}
