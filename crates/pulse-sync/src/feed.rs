// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification feed synchronization.
//!
//! The feed merges two sources. Polls replace it wholesale and set the
//! unread count from the authority. Pushes prepend records not seen yet and
//! bump the unread count by one. Dedup by id keeps a pushed record from being
//! counted twice when the next poll also carries it.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_bus::{EventBus, SubscriptionHandle};
use pulse_core::{
    NotificationPage, NotificationRecord, PulseError, RemoteAuthority, SyncKind, UnreadCounter,
    UserId,
};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::lock;
use crate::poller::{FirstPoll, PollTask};

/// Bounded, newest-first, id-unique sequence of notifications plus the
/// global unread count.
#[derive(Debug, Clone)]
pub struct NotificationFeed {
    items: VecDeque<NotificationRecord>,
    capacity: usize,
    unread: UnreadCounter,
}

impl NotificationFeed {
    /// Creates an empty feed holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            unread: UnreadCounter::default(),
        }
    }

    /// Prepends a pushed record. Returns `false`, changing nothing, if a
    /// record with the same id is already cached.
    pub fn push(&mut self, record: NotificationRecord) -> bool {
        if self.contains(&record.id) {
            return false;
        }
        self.items.push_front(record);
        self.items.truncate(self.capacity);
        self.unread.increment();
        true
    }

    /// Replaces the feed with an authoritative poll snapshot.
    ///
    /// The authority's ordering is kept. Repeated ids keep their first
    /// occurrence and the result is cut to capacity.
    pub fn replace(&mut self, page: NotificationPage) {
        let mut seen = HashSet::with_capacity(page.items.len());
        self.items = page
            .items
            .into_iter()
            .filter(|record| seen.insert(record.id.clone()))
            .take(self.capacity)
            .collect();
        self.unread.set(page.total_unread);
    }

    pub fn mark_all_read(&mut self) {
        for record in &mut self.items {
            record.is_read = true;
        }
        self.unread.reset();
    }

    /// Marks one cached record read. The unread count drops only when the
    /// record was cached and still unread.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|record| record.id == id) {
            Some(record) if !record.is_read => {
                record.is_read = true;
                self.unread.decrement();
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|record| record.id == id)
    }

    pub fn items(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn unread(&self) -> u64 {
        self.unread.get()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.unread.reset();
    }
}

#[derive(Debug)]
struct FeedState {
    feed: NotificationFeed,
    last_poll_at: Option<DateTime<Utc>>,
}

/// The parts of the synchronizer the poll task needs.
#[derive(Clone)]
struct FeedCore {
    user: UserId,
    authority: Arc<dyn RemoteAuthority>,
    state: Arc<Mutex<FeedState>>,
}

impl FeedCore {
    async fn poll(&self) -> Result<usize, PulseError> {
        let page = self.authority.fetch_notifications(&self.user).await?;
        let mut state = lock(&self.state);
        state.feed.replace(page);
        state.last_poll_at = Some(Utc::now());
        debug!(
            user_id = %self.user,
            items = state.feed.len(),
            unread = state.feed.unread(),
            "notification feed replaced from poll"
        );
        Ok(state.feed.len())
    }
}

/// Keeps the notification feed of one identity in sync.
pub struct FeedSynchronizer {
    core: FeedCore,
    interval: Duration,
    wake: Arc<Notify>,
    poller: Mutex<Option<PollTask>>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

impl FeedSynchronizer {
    pub fn new(
        user: UserId,
        authority: Arc<dyn RemoteAuthority>,
        capacity: usize,
        interval: Duration,
    ) -> Self {
        Self {
            core: FeedCore {
                user,
                authority,
                state: Arc::new(Mutex::new(FeedState {
                    feed: NotificationFeed::new(capacity),
                    last_poll_at: None,
                })),
            },
            interval,
            wake: Arc::new(Notify::new()),
            poller: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes the push path (`notification`) and the cross-device path
    /// (`sync`) on `bus`.
    pub fn attach(&self, bus: &EventBus) {
        let state = Arc::clone(&self.core.state);
        let on_notification = bus.on_notification(move |record| {
            let mut state = lock(&state);
            if state.feed.push(record.clone()) {
                debug!(id = %record.id, unread = state.feed.unread(), "notification pushed");
            } else {
                debug!(id = %record.id, "duplicate notification ignored");
            }
            Ok(())
        });

        let state = Arc::clone(&self.core.state);
        let wake = Arc::clone(&self.wake);
        let on_sync = bus.on_sync(move |event| {
            if event.kind == SyncKind::NotificationsRead {
                lock(&state).feed.mark_all_read();
                debug!(source_device = ?event.source_device, "feed cleared by another device");
            }
            wake.notify_one();
            Ok(())
        });

        lock(&self.subscriptions).extend([on_notification, on_sync]);
    }

    pub fn detach(&self, bus: &EventBus) {
        for handle in lock(&self.subscriptions).drain(..) {
            bus.unsubscribe(&handle);
        }
    }

    /// Fetches the feed now. On failure the cached feed is left untouched.
    pub async fn poll_now(&self) -> Result<(), PulseError> {
        self.core.poll().await.map(|_| ())
    }

    /// Starts the periodic poll, with the first poll right away. No-op while
    /// already polling.
    pub fn start_polling(&self) {
        let mut poller = lock(&self.poller);
        if poller.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let core = self.core.clone();
        *poller = Some(PollTask::spawn(
            "notifications",
            self.interval,
            FirstPoll::Immediate,
            Arc::clone(&self.wake),
            move || {
                let core = core.clone();
                async move {
                    if let Err(e) = core.poll().await {
                        warn!(user_id = %core.user, error = %e, "notification poll failed; keeping cached feed");
                    }
                }
            },
        ));
        info!(user_id = %self.core.user, interval_secs = self.interval.as_secs(), "notification polling started");
    }

    pub fn stop_polling(&self) {
        if let Some(task) = lock(&self.poller).take() {
            task.stop();
            info!(user_id = %self.core.user, "notification polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.poller)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Clears the unread count and marks every cached record read, then tells
    /// the authority. A failed remote call is logged and not rolled back.
    pub async fn mark_all_read(&self) {
        lock(&self.core.state).feed.mark_all_read();
        if let Err(e) = self
            .core
            .authority
            .mark_all_notifications_read(&self.core.user)
            .await
        {
            warn!(user_id = %self.core.user, error = %e, "remote mark-all-read failed");
        }
    }

    /// Marks one record read locally and remotely.
    pub async fn mark_read(&self, id: &str) {
        let changed = lock(&self.core.state).feed.mark_read(id);
        debug!(id, changed, "notification marked read");
        if let Err(e) = self.core.authority.mark_notification_read(id).await {
            warn!(id, error = %e, "remote mark-read failed");
        }
    }

    /// Viewing the feed clears it.
    pub async fn open_surface(&self) {
        self.mark_all_read().await;
    }

    pub fn items(&self) -> Vec<NotificationRecord> {
        lock(&self.core.state).feed.items().cloned().collect()
    }

    pub fn unread_count(&self) -> u64 {
        lock(&self.core.state).feed.unread()
    }

    pub fn last_poll_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.core.state).last_poll_at
    }

    /// Drops all cached state. Polling is not affected.
    pub fn reset(&self) {
        let mut state = lock(&self.core.state);
        state.feed.clear();
        state.last_poll_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn record(id: &str) -> NotificationRecord {
        NotificationRecord {
            id: id.to_string(),
            title: format!("title {id}"),
            message: String::new(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            source_device: None,
            is_read: false,
        }
    }

    fn ids(feed: &NotificationFeed) -> Vec<String> {
        feed.items().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn push_prepends_and_counts_unread() {
        let mut feed = NotificationFeed::new(50);
        assert!(feed.push(record("n1")));
        assert!(feed.push(record("n2")));
        assert_eq!(ids(&feed), vec!["n2", "n1"]);
        assert_eq!(feed.unread(), 2);
    }

    #[test]
    fn duplicate_push_is_ignored() {
        let mut feed = NotificationFeed::new(50);
        feed.push(record("n1"));
        assert!(!feed.push(record("n1")));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.unread(), 1);
    }

    #[test]
    fn sixty_pushes_keep_the_newest_fifty() {
        let mut feed = NotificationFeed::new(50);
        for i in 0..60 {
            feed.push(record(&format!("n{i}")));
        }
        assert_eq!(feed.len(), 50);
        let kept = ids(&feed);
        assert_eq!(kept.first().map(String::as_str), Some("n59"));
        assert_eq!(kept.last().map(String::as_str), Some("n10"));
        assert!(!feed.contains("n9"));
    }

    #[test]
    fn push_then_poll_yields_one_record_and_authoritative_unread() {
        let mut feed = NotificationFeed::new(50);
        feed.push(record("n1"));
        assert_eq!(feed.unread(), 1);

        feed.replace(NotificationPage {
            items: vec![record("n2"), record("n1")],
            total_unread: 2,
        });
        assert_eq!(ids(&feed), vec!["n2", "n1"]);
        assert_eq!(feed.unread(), 2);

        assert!(!feed.push(record("n1")), "poll-delivered id is not recounted");
        assert_eq!(feed.unread(), 2);
    }

    #[test]
    fn replace_dedups_and_truncates() {
        let mut feed = NotificationFeed::new(2);
        feed.replace(NotificationPage {
            items: vec![record("a"), record("a"), record("b"), record("c")],
            total_unread: 7,
        });
        assert_eq!(ids(&feed), vec!["a", "b"]);
        assert_eq!(feed.unread(), 7);
    }

    #[test]
    fn mark_read_never_goes_below_zero() {
        let mut feed = NotificationFeed::new(50);
        feed.push(record("n1"));
        assert!(feed.mark_read("n1"));
        assert!(!feed.mark_read("n1"));
        assert!(!feed.mark_read("missing"));
        assert_eq!(feed.unread(), 0);
    }

    #[test]
    fn mark_all_read_marks_every_record() {
        let mut feed = NotificationFeed::new(50);
        feed.push(record("n1"));
        feed.push(record("n2"));
        feed.mark_all_read();
        assert_eq!(feed.unread(), 0);
        assert!(feed.items().all(|r| r.is_read));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut feed = NotificationFeed::new(0);
        feed.push(record("a"));
        feed.push(record("b"));
        assert_eq!(feed.capacity(), 1);
        assert_eq!(ids(&feed), vec!["b"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u8),
        MarkRead(u8),
        MarkAll,
        Poll(Vec<u8>, u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u8..80).prop_map(Op::Push),
            2 => (0u8..80).prop_map(Op::MarkRead),
            1 => Just(Op::MarkAll),
            1 => (proptest::collection::vec(0u8..80, 0..70), 0u8..100)
                .prop_map(|(ids, unread)| Op::Poll(ids, unread)),
        ]
    }

    proptest! {
        #[test]
        fn feed_stays_bounded_and_unique(ops in proptest::collection::vec(op(), 0..200)) {
            let mut feed = NotificationFeed::new(50);
            for op in ops {
                match op {
                    Op::Push(id) => {
                        let id = format!("n{id}");
                        let fresh = feed.push(record(&id));
                        if fresh {
                            prop_assert_eq!(feed.items().next().map(|r| r.id.clone()), Some(id));
                        }
                    }
                    Op::MarkRead(id) => {
                        let before = feed.unread();
                        feed.mark_read(&format!("n{id}"));
                        prop_assert!(feed.unread() <= before);
                    }
                    Op::MarkAll => feed.mark_all_read(),
                    Op::Poll(ids, unread) => feed.replace(NotificationPage {
                        items: ids.iter().map(|id| record(&format!("n{id}"))).collect(),
                        total_unread: u64::from(unread),
                    }),
                }
                prop_assert!(feed.len() <= 50);
                let unique: HashSet<String> = feed.items().map(|r| r.id.clone()).collect();
                prop_assert_eq!(unique.len(), feed.len());
            }
        }
    }
}
