// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes of the remote authority's REST responses and request bodies.

use pulse_core::DeviceClass;
use serde::{Deserialize, Serialize};

/// A response body that is either wrapped as `{"status": .., "data": T}` or
/// sent bare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

/// Body of `GET /messages/unread/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UnreadCountResponse {
    Object {
        #[serde(alias = "unread_count", alias = "total_unread")]
        count: u64,
    },
    Wrapped {
        data: u64,
    },
    Bare(u64),
}

impl UnreadCountResponse {
    pub fn count(&self) -> u64 {
        match self {
            UnreadCountResponse::Object { count } => *count,
            UnreadCountResponse::Wrapped { data } => *data,
            UnreadCountResponse::Bare(count) => *count,
        }
    }
}

/// Body of `GET /messages/status/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(alias = "online", alias = "isOnline")]
    pub is_online: bool,
    #[serde(default)]
    pub device_class: Option<DeviceClass>,
}

/// Body of `PUT /messages/status/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub is_online: bool,
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageBody<'a> {
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub content: &'a str,
}

/// Error body returned by the authority on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(alias = "error")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_accepts_wrapped_and_bare() {
        let wrapped: Envelope<Vec<u32>> =
            serde_json::from_str(r#"{"status":"ok","data":[1,2]}"#).unwrap();
        assert_eq!(wrapped.into_inner(), vec![1, 2]);

        let bare: Envelope<Vec<u32>> = serde_json::from_str("[3]").unwrap();
        assert_eq!(bare.into_inner(), vec![3]);
    }

    #[test]
    fn unread_count_accepts_all_shapes() {
        for (body, expected) in [
            (r#"{"count":4}"#, 4),
            (r#"{"unread_count":2}"#, 2),
            (r#"{"status":"ok","data":7}"#, 7),
            ("9", 9),
        ] {
            let parsed: UnreadCountResponse = serde_json::from_str(body).unwrap();
            assert_eq!(parsed.count(), expected, "body: {body}");
        }
    }

    #[test]
    fn status_response_accepts_online_alias() {
        let parsed: StatusResponse =
            serde_json::from_str(r#"{"online":true,"device_class":"mobile"}"#).unwrap();
        assert!(parsed.is_online);
        assert_eq!(parsed.device_class, Some(DeviceClass::Mobile));
    }
}
