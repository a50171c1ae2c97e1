// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch registry: topic-keyed subscriber lists with snapshot dispatch.
//!
//! Subscriber lists are guarded by an `RwLock`, but callbacks never run while
//! it is held: `dispatch` clones the list for the event's topic and releases
//! the lock first. A callback may therefore subscribe or unsubscribe (even
//! itself) during dispatch; the change takes effect from the next dispatch.
//!
//! A subscriber that returns `Err` or panics is logged and counted as failed,
//! and delivery continues with the next one. Panic isolation relies on
//! unwinding: under `panic = "abort"` (the `release-musl` profile) a
//! panicking subscriber aborts the process, so only `Err` returns are
//! isolated there.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pulse_core::PulseError;
use pulse_core::types::{Message, NotificationRecord, PresenceEvent, SyncEvent};
use tracing::{debug, warn};

use crate::event::{BusEvent, TransportEvent};
use crate::topic::Topic;

type Handler = dyn Fn(&BusEvent) -> Result<(), PulseError> + Send + Sync;

/// Handle returned by `subscribe`, used solely for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    topic: Topic,
    id: u64,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[derive(Clone)]
struct Subscriber {
    id: u64,
    handler: Arc<Handler>,
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers that returned `Ok`.
    pub delivered: usize,
    /// Subscribers that returned an error or panicked.
    pub failed: usize,
}

/// In-process pub/sub multiplexer keyed by [`Topic`].
///
/// Dispatch order within a topic is subscription order. A failing subscriber
/// is logged and skipped; the remaining subscribers still receive the event.
#[derive(Default)]
pub struct EventBus {
    topics: RwLock<HashMap<Topic, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `topic`. Never rejects; registering the same
    /// closure twice yields two independent entries.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionHandle
    where
        F: Fn(&BusEvent) -> Result<(), PulseError> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.write()
            .entry(topic)
            .or_default()
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });
        debug!(%topic, id, "subscriber registered");
        SubscriptionHandle { topic, id }
    }

    /// Removes the entry behind `handle`. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut topics = self.write();
        let Some(subscribers) = topics.get_mut(&handle.topic) else {
            return false;
        };
        match subscribers.iter().position(|s| s.id == handle.id) {
            Some(index) => {
                subscribers.remove(index);
                if subscribers.is_empty() {
                    topics.remove(&handle.topic);
                }
                true
            }
            None => false,
        }
    }

    /// Delivers `event` to a snapshot of the subscribers of its topic.
    ///
    /// Panics are caught only when the binary is built with unwinding.
    pub fn dispatch(&self, event: &BusEvent) -> DispatchReport {
        let topic = event.topic();
        let snapshot: Vec<Subscriber> = self
            .read()
            .get(&topic)
            .map(|subscribers| subscribers.to_vec())
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for subscriber in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(event)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    let err = PulseError::Subscriber {
                        topic: topic.to_string(),
                        message: e.to_string(),
                    };
                    warn!(%topic, id = subscriber.id, error = %err, "subscriber failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    let message = panic_message(panic.as_ref());
                    warn!(%topic, id = subscriber.id, panic = %message, "subscriber panicked");
                }
            }
        }

        debug!(
            %topic,
            delivered = report.delivered,
            failed = report.failed,
            "event dispatched"
        );
        report
    }

    /// Drops every subscription on every topic.
    pub fn clear(&self) {
        let mut topics = self.write();
        let dropped: usize = topics.values().map(Vec::len).sum();
        topics.clear();
        debug!(dropped, "registry cleared");
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.read().get(&topic).map_or(0, Vec::len)
    }

    pub fn total_subscribers(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    // --- typed subscriptions ---

    /// Subscribes to `notification` with a handler that only sees notification records.
    pub fn on_notification<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&NotificationRecord) -> Result<(), PulseError> + Send + Sync + 'static,
    {
        self.subscribe(Topic::Notification, move |event| match event {
            BusEvent::Notification(record) => handler(record),
            _ => Ok(()),
        })
    }

    pub fn on_message<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&Message) -> Result<(), PulseError> + Send + Sync + 'static,
    {
        self.subscribe(Topic::Message, move |event| match event {
            BusEvent::Message(message) => handler(message),
            _ => Ok(()),
        })
    }

    pub fn on_sync<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&SyncEvent) -> Result<(), PulseError> + Send + Sync + 'static,
    {
        self.subscribe(Topic::Sync, move |event| match event {
            BusEvent::Sync(sync) => handler(sync),
            _ => Ok(()),
        })
    }

    /// Subscribes to both presence topics. The handler receives `true` for
    /// `presence_up` and `false` for `presence_down`.
    pub fn on_presence<F>(&self, handler: F) -> [SubscriptionHandle; 2]
    where
        F: Fn(&PresenceEvent, bool) -> Result<(), PulseError> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let up = Arc::clone(&handler);
        let up_handle = self.subscribe(Topic::PresenceUp, move |event| match event {
            BusEvent::PresenceUp(presence) => up(presence, true),
            _ => Ok(()),
        });
        let down_handle = self.subscribe(Topic::PresenceDown, move |event| match event {
            BusEvent::PresenceDown(presence) => handler(presence, false),
            _ => Ok(()),
        });
        [up_handle, down_handle]
    }

    /// Subscribes to `connect`, `disconnect` and `error` with one handler.
    pub fn on_transport<F>(&self, handler: F) -> [SubscriptionHandle; 3]
    where
        F: Fn(&TransportEvent) -> Result<(), PulseError> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        [Topic::Connect, Topic::Disconnect, Topic::Error].map(|topic| {
            let handler = Arc::clone(&handler);
            self.subscribe(topic, move |event| match event {
                BusEvent::Transport(transport) => handler(transport),
                _ => Ok(()),
            })
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Topic, Vec<Subscriber>>> {
        // Callbacks never run under the lock, so a poisoned guard still holds a
        // consistent map.
        self.topics.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Topic, Vec<Subscriber>>> {
        self.topics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use pulse_core::types::UserId;
    use tracing_test::traced_test;

    fn notification(id: &str) -> BusEvent {
        BusEvent::Notification(NotificationRecord {
            id: id.to_string(),
            title: "Hi".to_string(),
            message: String::new(),
            created_at: Utc::now(),
            source_device: None,
            is_read: false,
        })
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<Handler>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_factory = Arc::clone(&log);
        let factory = move |name: &str| -> Box<Handler> {
            let log = Arc::clone(&log_for_factory);
            let name = name.to_string();
            Box::new(move |event: &BusEvent| {
                log.lock().unwrap().push(format!("{name}:{}", event.topic()));
                Ok::<(), PulseError>(())
            })
        };
        (log, factory)
    }

    #[test]
    fn dispatch_follows_subscription_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        for name in ["a", "b", "c"] {
            let handler = make(name);
            bus.subscribe(Topic::Notification, move |e| handler(e));
        }

        let report = bus.dispatch(&notification("n1"));
        assert_eq!(report, DispatchReport { delivered: 3, failed: 0 });
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:notification", "b:notification", "c:notification"]
        );
    }

    #[test]
    fn dispatch_only_reaches_the_event_topic() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let handler = make("msg");
        bus.subscribe(Topic::Message, move |e| handler(e));

        let report = bus.dispatch(&notification("n1"));
        assert_eq!(report.delivered, 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[traced_test]
    #[test]
    fn failing_subscriber_does_not_block_the_next_one() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(Topic::Notification, |_| Err(PulseError::Internal("bad".into())));
        let sink = Arc::clone(&received);
        bus.on_notification(move |record| {
            sink.lock().unwrap().push(record.id.clone());
            Ok(())
        });

        let report = bus.dispatch(&notification("n1"));
        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(*received.lock().unwrap(), vec!["n1".to_string()]);
        assert!(logs_contain("subscriber failed"));
    }

    // Needs unwinding; with `panic = "abort"` the panic takes the process down.
    #[cfg(panic = "unwind")]
    #[traced_test]
    #[test]
    fn panicking_subscriber_does_not_block_the_next_one() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(Topic::Notification, |_| panic!("subscriber exploded"));
        let sink = Arc::clone(&received);
        bus.on_notification(move |record| {
            sink.lock().unwrap().push(record.id.clone());
            Ok(())
        });

        let report = bus.dispatch(&notification("n1"));
        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(*received.lock().unwrap(), vec!["n1".to_string()]);
        assert!(logs_contain("subscriber panicked"));
    }

    #[test]
    fn unsubscribe_removes_only_the_matching_entry() {
        let bus = EventBus::new();
        let first = bus.subscribe(Topic::Sync, |_| Ok(()));
        let _second = bus.subscribe(Topic::Sync, |_| Ok(()));
        assert_eq!(bus.subscriber_count(Topic::Sync), 2);

        assert!(bus.unsubscribe(&first));
        assert_eq!(bus.subscriber_count(Topic::Sync), 1);
        assert!(!bus.unsubscribe(&first), "second removal is a no-op");
    }

    #[test]
    fn subscribing_the_same_closure_twice_yields_two_entries() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));
        let handler = {
            let hits = Arc::clone(&hits);
            Arc::new(move |_: &BusEvent| {
                *hits.lock().unwrap() += 1;
                Ok::<(), PulseError>(())
            })
        };
        let h1 = Arc::clone(&handler);
        let h2 = Arc::clone(&handler);
        bus.subscribe(Topic::Notification, move |e| h1(e));
        bus.subscribe(Topic::Notification, move |e| h2(e));

        bus.dispatch(&notification("n1"));
        assert_eq!(*hits.lock().unwrap(), 2);
    }

    #[test]
    fn self_unsubscribe_during_dispatch_is_safe() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(Mutex::new(0));

        let handle = {
            let bus_ref = Arc::clone(&bus);
            let slot = Arc::clone(&slot);
            let hits = Arc::clone(&hits);
            bus.subscribe(Topic::Notification, move |_| {
                *hits.lock().unwrap() += 1;
                if let Some(handle) = slot.lock().unwrap().take() {
                    bus_ref.unsubscribe(&handle);
                }
                Ok(())
            })
        };
        *slot.lock().unwrap() = Some(handle);
        let late = Arc::new(Mutex::new(0));
        {
            let late = Arc::clone(&late);
            bus.subscribe(Topic::Notification, move |_| {
                *late.lock().unwrap() += 1;
                Ok(())
            });
        }

        let first = bus.dispatch(&notification("n1"));
        assert_eq!(first.delivered, 2, "snapshot still includes both subscribers");
        let second = bus.dispatch(&notification("n2"));
        assert_eq!(second.delivered, 1);
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(*late.lock().unwrap(), 2);
    }

    #[test]
    fn subscribe_during_dispatch_takes_effect_next_time() {
        let bus = Arc::new(EventBus::new());
        let bus_ref = Arc::clone(&bus);
        bus.subscribe(Topic::Notification, move |_| {
            bus_ref.subscribe(Topic::Notification, |_| Ok(()));
            Ok(())
        });

        let first = bus.dispatch(&notification("n1"));
        assert_eq!(first.delivered, 1, "the new subscriber is not in the snapshot");
        assert_eq!(bus.subscriber_count(Topic::Notification), 2);

        let second = bus.dispatch(&notification("n2"));
        assert_eq!(second.delivered, 2);
    }

    #[test]
    fn on_presence_distinguishes_up_and_down() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handles = bus.on_presence(move |presence, online| {
            sink.lock().unwrap().push((presence.peer_id.to_string(), online));
            Ok(())
        });
        assert_eq!(handles[0].topic(), Topic::PresenceUp);
        assert_eq!(handles[1].topic(), Topic::PresenceDown);

        let bob = PresenceEvent {
            peer_id: UserId::from("bob"),
            device_class: None,
        };
        bus.dispatch(&BusEvent::PresenceUp(bob.clone()));
        bus.dispatch(&BusEvent::PresenceDown(bob));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("bob".to_string(), true), ("bob".to_string(), false)]
        );
    }

    #[test]
    fn clear_drops_every_topic() {
        let bus = EventBus::new();
        bus.subscribe(Topic::Notification, |_| Ok(()));
        bus.subscribe(Topic::Disconnect, |_| Ok(()));
        assert_eq!(bus.total_subscribers(), 2);

        bus.clear();
        assert_eq!(bus.total_subscribers(), 0);
        let report = bus.dispatch(&BusEvent::Transport(TransportEvent::Disconnected {
            reason: "test".into(),
        }));
        assert_eq!(report.delivered, 0);
    }

    #[test]
    fn on_transport_covers_all_three_topics() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on_transport(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        assert_eq!(bus.total_subscribers(), 3);

        bus.dispatch(&BusEvent::Transport(TransportEvent::Connected {
            user_id: UserId::from("alice"),
        }));
        bus.dispatch(&BusEvent::Transport(TransportEvent::Error {
            message: "reset".into(),
        }));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
