// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory of peer online/offline state fed by presence events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use pulse_bus::{EventBus, SubscriptionHandle};
use pulse_core::{PresenceEvent, PresenceRecord, PulseError, RemoteAuthority, UserId};
use tracing::debug;

use crate::lock;

type Directory = HashMap<UserId, PresenceRecord>;

/// Consumes `presence_up`/`presence_down`. Last event to arrive wins.
///
/// The tracker never announces this identity's own presence; the session
/// does that after registration.
#[derive(Default)]
pub struct PresenceTracker {
    directory: Arc<RwLock<Directory>>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, bus: &EventBus) {
        let directory = Arc::clone(&self.directory);
        let handles = bus.on_presence(move |event, online| {
            apply(&directory, event, online);
            Ok(())
        });
        lock(&self.subscriptions).extend(handles);
    }

    pub fn detach(&self, bus: &EventBus) {
        for handle in lock(&self.subscriptions).drain(..) {
            bus.unsubscribe(&handle);
        }
    }

    /// Initialises a peer's entry from the authority. An entry already set by
    /// a presence event is newer and is kept.
    pub async fn seed(
        &self,
        peer: &UserId,
        authority: &dyn RemoteAuthority,
    ) -> Result<PresenceRecord, PulseError> {
        let status = authority.fetch_presence(peer).await?;
        let mut directory = self
            .directory
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = directory
            .entry(peer.clone())
            .or_insert_with(|| PresenceRecord {
                peer_id: peer.clone(),
                device_class: status.device_class,
                is_online: status.is_online,
            });
        debug!(peer_id = %peer, online = record.is_online, "presence seeded");
        Ok(record.clone())
    }

    pub fn get(&self, peer: &UserId) -> Option<PresenceRecord> {
        self.read().get(peer).cloned()
    }

    pub fn is_online(&self, peer: &UserId) -> bool {
        self.read().get(peer).is_some_and(|r| r.is_online)
    }

    /// Online peers, sorted by id.
    pub fn online_peers(&self) -> Vec<UserId> {
        let mut peers: Vec<UserId> = self
            .read()
            .values()
            .filter(|r| r.is_online)
            .map(|r| r.peer_id.clone())
            .collect();
        peers.sort();
        peers
    }

    /// Every known peer, sorted by id.
    pub fn snapshot(&self) -> Vec<PresenceRecord> {
        let mut records: Vec<PresenceRecord> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        records
    }

    pub fn reset(&self) {
        self.directory
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Directory> {
        self.directory
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn apply(directory: &RwLock<Directory>, event: &PresenceEvent, online: bool) {
    let mut directory = directory
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let record = directory
        .entry(event.peer_id.clone())
        .or_insert_with(|| PresenceRecord {
            peer_id: event.peer_id.clone(),
            device_class: None,
            is_online: online,
        });
    record.is_online = online;
    if event.device_class.is_some() {
        record.device_class = event.device_class;
    }
    debug!(peer_id = %event.peer_id, online, "presence updated");
}
