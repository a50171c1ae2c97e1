// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pulse sync core.
//!
//! This crate provides the error type, the domain data model, and the two
//! adapter seams (push transport and remote authority) that the rest of the
//! workspace is written against.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{BoxError, PulseError};
pub use types::{
    AdapterType, Attachment, ConnectionState, ConversationSummary, DeviceClass, HealthStatus,
    Identity, Message, NotificationPage, NotificationRecord, OutgoingMessage, PresenceEvent,
    PresenceRecord, PresenceStatus, PushFrame, SyncEvent, SyncKind, UnreadCounter, UploadBundle,
    UploadFile, UserId,
};

pub use traits::{PluginAdapter, PushTransport, RemoteAuthority, TransportFactory};
