// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronization core of Pulse.
//!
//! A [`SyncSession`] owns one identity's view of the world: the push
//! connection ([`ConnectionManager`]), the peer presence directory
//! ([`PresenceTracker`]), the bounded notification feed
//! ([`FeedSynchronizer`]) and the conversations ([`ConversationSynchronizer`]).
//! Components talk to each other only through the session's
//! [`EventBus`](pulse_bus::EventBus).
//!
//! Poll results always win over push-derived state: polls replace local
//! state wholesale, pushes fill in between polls and are deduplicated by id.

pub mod connection;
pub mod conversation;
pub mod feed;
mod poller;
pub mod presence;
pub mod session;
pub mod shutdown;
pub mod upload;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use connection::ConnectionManager;
pub use conversation::{Conversation, ConversationSynchronizer};
pub use feed::{FeedSynchronizer, NotificationFeed};
pub use presence::PresenceTracker;
pub use session::SyncSession;
pub use upload::UploadCoordinator;

/// Locks `mutex`, recovering the guard if a panicking holder poisoned it.
///
/// State guarded this way is only mutated by short, non-panicking sections,
/// so a poisoned value is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
