// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation synchronization.
//!
//! At most one conversation is active. The active conversation is polled
//! every few seconds and its message list replaced by each poll; pushed
//! messages for it are not merged and surface on the next tick. Pushed
//! messages for inactive conversations update their summary (last message,
//! unread badge) only.
//!
//! Every `select`/`deselect` bumps a selection counter. A `select` that
//! awaited the authority only marks read and starts its poller if its
//! selection is still the current one, so a late `select` never revives a
//! deselected or superseded conversation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulse_bus::{EventBus, SubscriptionHandle};
use pulse_core::{
    ConversationSummary, Message, OutgoingMessage, PulseError, RemoteAuthority, SyncKind,
    UnreadCounter, UploadBundle, UploadFile, UserId,
};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::lock;
use crate::poller::{FirstPoll, PollTask};
use crate::upload::UploadCoordinator;

/// One conversation with a peer.
///
/// `messages` is unique by id and ordered by `created_at`. It is only filled
/// for conversations that were fetched; summaries of the others carry just
/// the last message and the unread badge.
#[derive(Debug, Clone)]
pub struct Conversation {
    peer_id: UserId,
    messages: Vec<Message>,
    last_message: Option<Message>,
    unread: UnreadCounter,
    counted: HashSet<String>,
}

impl Conversation {
    pub fn new(peer_id: UserId) -> Self {
        Self {
            peer_id,
            messages: Vec::new(),
            last_message: None,
            unread: UnreadCounter::default(),
            counted: HashSet::new(),
        }
    }

    /// Replaces the message list with a poll result.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        let mut seen = HashSet::with_capacity(messages.len());
        let mut messages: Vec<Message> = messages
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if let Some(last) = messages.last() {
            self.last_message = Some(last.clone());
        }
        self.messages = messages;
    }

    /// Records a pushed message for this (inactive) conversation. Returns
    /// `false` if the message was already seen.
    pub fn note_pushed(&mut self, message: &Message, self_id: &UserId) -> bool {
        let known = self.counted.contains(&message.id)
            || self.messages.iter().any(|m| m.id == message.id)
            || self
                .last_message
                .as_ref()
                .is_some_and(|m| m.id == message.id);
        if known {
            return false;
        }

        let newer = self
            .last_message
            .as_ref()
            .is_none_or(|last| message.created_at >= last.created_at);
        if newer {
            self.last_message = Some(message.clone());
        }
        if &message.receiver_id == self_id {
            self.unread.increment();
            self.counted.insert(message.id.clone());
        }
        true
    }

    /// Takes the authority's summary for this peer.
    pub fn apply_summary(&mut self, summary: ConversationSummary) {
        if summary.last_message.is_some() {
            self.last_message = summary.last_message;
        }
        self.unread.set(summary.unread_count);
        self.counted.clear();
    }

    /// Zeroes the unread badge. Returns the count that was cleared.
    pub fn mark_read(&mut self) -> u64 {
        let cleared = self.unread.get();
        self.unread.reset();
        self.counted.clear();
        cleared
    }

    pub fn peer_id(&self) -> &UserId {
        &self.peer_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.last_message.as_ref()
    }

    pub fn unread(&self) -> u64 {
        self.unread.get()
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            peer_id: self.peer_id.clone(),
            last_message: self.last_message.clone(),
            unread_count: self.unread.get(),
        }
    }
}

#[derive(Debug, Default)]
struct ConversationState {
    active_peer: Option<UserId>,
    selection: u64,
    conversations: HashMap<UserId, Conversation>,
    total_unread: UnreadCounter,
}

impl ConversationState {
    fn entry(&mut self, peer: &UserId) -> &mut Conversation {
        self.conversations
            .entry(peer.clone())
            .or_insert_with(|| Conversation::new(peer.clone()))
    }

    /// Switches the active conversation and returns the new selection.
    fn switch_to(&mut self, peer: Option<UserId>) -> (u64, Option<UserId>) {
        self.selection += 1;
        let previous = std::mem::replace(&mut self.active_peer, peer);
        (self.selection, previous)
    }

    fn is_current(&self, peer: &UserId, selection: u64) -> bool {
        self.selection == selection && self.active_peer.as_ref() == Some(peer)
    }

    fn mark_read(&mut self, peer: &UserId) {
        let cleared = self.entry(peer).mark_read();
        let remaining = self.total_unread.get().saturating_sub(cleared);
        self.total_unread.set(remaining);
    }
}

/// The parts of the synchronizer the poll task needs.
#[derive(Clone)]
struct ConversationCore {
    self_id: UserId,
    authority: Arc<dyn RemoteAuthority>,
    state: Arc<Mutex<ConversationState>>,
}

impl ConversationCore {
    /// Fetches `peer`'s conversation and applies it if `peer` is still active.
    async fn poll(&self, peer: &UserId) -> Result<(), PulseError> {
        let messages = self.authority.fetch_conversation(&self.self_id, peer).await?;
        let mut state = lock(&self.state);
        if state.active_peer.as_ref() != Some(peer) {
            debug!(peer_id = %peer, "conversation deselected during poll; result dropped");
            return Ok(());
        }
        let conversation = state.entry(peer);
        conversation.replace_messages(messages);
        debug!(
            peer_id = %peer,
            messages = conversation.messages().len(),
            "conversation replaced from poll"
        );
        Ok(())
    }
}

/// Keeps the conversations of one identity in sync.
pub struct ConversationSynchronizer {
    core: ConversationCore,
    uploads: UploadCoordinator,
    interval: Duration,
    wake: Arc<Notify>,
    poller: Mutex<Option<PollTask>>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

impl ConversationSynchronizer {
    pub fn new(
        self_id: UserId,
        authority: Arc<dyn RemoteAuthority>,
        uploads: UploadCoordinator,
        interval: Duration,
    ) -> Self {
        Self {
            core: ConversationCore {
                self_id,
                authority,
                state: Arc::new(Mutex::new(ConversationState::default())),
            },
            uploads,
            interval,
            wake: Arc::new(Notify::new()),
            poller: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn attach(&self, bus: &EventBus) {
        let self_id = self.core.self_id.clone();
        let state = Arc::clone(&self.core.state);
        let on_message = bus.on_message(move |message| {
            let Some(peer) = message.peer_of(&self_id).cloned() else {
                debug!(id = %message.id, "message not addressed to this identity");
                return Ok(());
            };
            let mut state = lock(&state);
            if state.active_peer.as_ref() == Some(&peer) {
                debug!(peer_id = %peer, id = %message.id, "active conversation; next poll will surface it");
                return Ok(());
            }
            if state.entry(&peer).note_pushed(message, &self_id) && message.receiver_id == self_id {
                state.total_unread.increment();
            }
            Ok(())
        });

        let state = Arc::clone(&self.core.state);
        let wake = Arc::clone(&self.wake);
        let on_sync = bus.on_sync(move |event| {
            match (event.kind, &event.peer_id) {
                (SyncKind::MessagesRead, Some(peer)) => {
                    lock(&state).mark_read(peer);
                    debug!(peer_id = %peer, "conversation read on another device");
                    wake.notify_one();
                }
                (SyncKind::Refresh, _) => wake.notify_one(),
                _ => {}
            }
            Ok(())
        });

        lock(&self.subscriptions).extend([on_message, on_sync]);
    }

    pub fn detach(&self, bus: &EventBus) {
        for handle in lock(&self.subscriptions).drain(..) {
            bus.unsubscribe(&handle);
        }
    }

    /// Makes `peer` the active conversation: fetches it once, marks it read
    /// remotely, zeroes its badge, and starts polling it. Any previously
    /// active conversation stops polling first.
    ///
    /// If the selection changes while the fetch or the remote mark-read is
    /// in flight, the remaining steps are skipped.
    pub async fn select(&self, peer: &UserId) {
        let (selection, _) = lock(&self.core.state).switch_to(Some(peer.clone()));
        self.stop_polling();
        info!(peer_id = %peer, "conversation selected");

        if let Err(e) = self.core.poll(peer).await {
            warn!(peer_id = %peer, error = %e, "conversation fetch failed; keeping cached messages");
        }

        {
            let mut state = lock(&self.core.state);
            if !state.is_current(peer, selection) {
                debug!(peer_id = %peer, "selection changed during fetch; not marking read");
                return;
            }
            state.mark_read(peer);
        }
        if let Err(e) = self
            .core
            .authority
            .mark_conversation_read(peer, &self.core.self_id)
            .await
        {
            warn!(peer_id = %peer, error = %e, "remote mark-conversation-read failed");
        }

        self.start_polling(peer.clone(), selection);
    }

    /// Stops polling the active conversation and clears the selection.
    pub fn deselect(&self) {
        let (_, previous) = lock(&self.core.state).switch_to(None);
        self.stop_polling();
        if let Some(peer) = previous {
            info!(peer_id = %peer, "conversation deselected");
        }
    }

    /// Fetches the active conversation now. No-op without a selection.
    pub async fn poll_now(&self) -> Result<(), PulseError> {
        let active = lock(&self.core.state).active_peer.clone();
        match active {
            Some(peer) => self.core.poll(&peer).await,
            None => Ok(()),
        }
    }

    /// Replaces all conversation summaries with the authority's list.
    pub async fn refresh_conversations(&self) -> Result<(), PulseError> {
        let summaries = self
            .core
            .authority
            .fetch_conversations(&self.core.self_id)
            .await?;
        let mut state = lock(&self.core.state);
        let count = summaries.len();
        for summary in summaries {
            let peer = summary.peer_id.clone();
            state.entry(&peer).apply_summary(summary);
        }
        debug!(conversations = count, "conversation summaries refreshed");
        Ok(())
    }

    /// Reloads the total unread message count from the authority.
    pub async fn refresh_unread(&self) -> Result<u64, PulseError> {
        let total = self
            .core
            .authority
            .unread_message_count(&self.core.self_id)
            .await?;
        lock(&self.core.state).total_unread.set(total);
        Ok(total)
    }

    /// Sends a text message. On success the active conversation is re-polled
    /// instead of inserting the message locally.
    pub async fn send_message(&self, peer: &UserId, body: &str) -> Result<Message, PulseError> {
        let outgoing = OutgoingMessage {
            sender_id: self.core.self_id.clone(),
            receiver_id: peer.clone(),
            body: body.to_string(),
        };
        let stored = self.core.authority.send_message(&outgoing).await?;
        debug!(peer_id = %peer, id = %stored.id, "message sent");
        self.repoll_if_active(peer).await;
        Ok(stored)
    }

    /// Sends text plus attachments as one bundle through the upload
    /// coordinator.
    pub async fn send_message_with_attachments(
        &self,
        peer: &UserId,
        body: &str,
        files: Vec<UploadFile>,
    ) -> Result<Message, PulseError> {
        let bundle = UploadBundle {
            sender_id: self.core.self_id.clone(),
            receiver_id: peer.clone(),
            body: body.to_string(),
            files,
        };
        let stored = self.uploads.submit(&bundle).await?;
        self.repoll_if_active(peer).await;
        Ok(stored)
    }

    pub fn active_peer(&self) -> Option<UserId> {
        lock(&self.core.state).active_peer.clone()
    }

    /// Messages of the active conversation.
    pub fn messages(&self) -> Vec<Message> {
        let state = lock(&self.core.state);
        state
            .active_peer
            .as_ref()
            .and_then(|peer| state.conversations.get(peer))
            .map(|c| c.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn conversation(&self, peer: &UserId) -> Option<Conversation> {
        lock(&self.core.state).conversations.get(peer).cloned()
    }

    pub fn unread_for(&self, peer: &UserId) -> u64 {
        lock(&self.core.state)
            .conversations
            .get(peer)
            .map_or(0, Conversation::unread)
    }

    pub fn total_unread(&self) -> u64 {
        lock(&self.core.state).total_unread.get()
    }

    /// Summaries of every known conversation, most recent first.
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        let mut summaries: Vec<ConversationSummary> = lock(&self.core.state)
            .conversations
            .values()
            .map(Conversation::summary)
            .collect();
        summaries.sort_by(|a, b| {
            let a_at = a.last_message.as_ref().map(|m| m.created_at);
            let b_at = b.last_message.as_ref().map(|m| m.created_at);
            b_at.cmp(&a_at).then_with(|| a.peer_id.cmp(&b.peer_id))
        });
        summaries
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.poller)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops polling and drops all cached conversations.
    pub fn reset(&self) {
        {
            let mut state = lock(&self.core.state);
            let selection = state.selection + 1;
            *state = ConversationState {
                selection,
                ..ConversationState::default()
            };
        }
        self.stop_polling();
    }

    /// Starts polling `peer` unless `selection` has been superseded.
    ///
    /// The poller slot stays locked across the check so a concurrent
    /// switch either sees this task and stops it or is seen by the check.
    fn start_polling(&self, peer: UserId, selection: u64) {
        let mut poller = lock(&self.poller);
        if !lock(&self.core.state).is_current(&peer, selection) {
            debug!(peer_id = %peer, "selection changed; conversation poller not started");
            return;
        }
        let core = self.core.clone();
        let task = PollTask::spawn(
            "conversation",
            self.interval,
            FirstPoll::AfterPeriod,
            Arc::clone(&self.wake),
            move || {
                let core = core.clone();
                let peer = peer.clone();
                async move {
                    if let Err(e) = core.poll(&peer).await {
                        warn!(peer_id = %peer, error = %e, "conversation poll failed; keeping cached messages");
                    }
                }
            },
        );
        if let Some(previous) = poller.replace(task) {
            previous.stop();
        }
    }

    fn stop_polling(&self) {
        if let Some(task) = lock(&self.poller).take() {
            task.stop();
        }
    }

    async fn repoll_if_active(&self, peer: &UserId) {
        if self.active_peer().as_ref() != Some(peer) {
            return;
        }
        if let Err(e) = self.core.poll(peer).await {
            warn!(peer_id = %peer, error = %e, "post-send poll failed");
        }
    }
}
