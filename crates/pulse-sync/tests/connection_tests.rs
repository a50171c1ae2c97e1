// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection manager behaviour against the mock push broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pulse_bus::{EventBus, Topic, TransportEvent};
use pulse_config::model::PushConfig;
use pulse_core::{ConnectionState, DeviceClass, Identity, PulseError};
use pulse_sync::ConnectionManager;
use pulse_test_utils::MockTransportFactory;
use pulse_test_utils::fixtures::notification_json;

fn manager(factory: &MockTransportFactory) -> (Arc<EventBus>, ConnectionManager) {
    let bus = Arc::new(EventBus::new());
    let config = PushConfig {
        endpoint: "ws://broker.test/push".to_string(),
        registration_timeout_secs: 3,
    };
    let manager = ConnectionManager::new(Arc::clone(&bus), Arc::new(factory.clone()), config);
    (bus, manager)
}

fn alice() -> Identity {
    Identity::new("alice", DeviceClass::Mobile)
}

fn count_topic(bus: &EventBus, topic: Topic) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    bus.subscribe(topic, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    count
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn connect_registers_identity_and_device() {
    let factory = MockTransportFactory::new();
    let (bus, manager) = manager(&factory);
    let connects = count_topic(&bus, Topic::Connect);

    manager.connect(&alice(), None).await.unwrap();

    assert_eq!(manager.state(), ConnectionState::Registered);
    assert_eq!(factory.endpoints(), vec!["ws://broker.test/push".to_string()]);
    let registrations = factory.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(
        registrations[0].data,
        serde_json::json!({"user_id": "alice", "device_class": "mobile"})
    );
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_twice_keeps_one_channel() {
    let factory = MockTransportFactory::new();
    let (_bus, manager) = manager(&factory);

    manager.connect(&alice(), None).await.unwrap();
    manager.connect(&alice(), None).await.unwrap();

    assert_eq!(factory.open_count(), 1);
    assert_eq!(factory.registrations().len(), 1);
}

#[tokio::test]
async fn connect_as_other_identity_replaces_channel() {
    let factory = MockTransportFactory::new();
    let (_bus, manager) = manager(&factory);

    manager.connect(&alice(), None).await.unwrap();
    manager
        .connect(&Identity::new("bob", DeviceClass::Web), None)
        .await
        .unwrap();

    assert_eq!(factory.open_count(), 2);
    assert_eq!(factory.registrations().len(), 2);
    assert_eq!(manager.state(), ConnectionState::Registered);
}

#[tokio::test]
async fn endpoint_override_is_used() {
    let factory = MockTransportFactory::new();
    let (_bus, manager) = manager(&factory);

    manager
        .connect(&alice(), Some("wss://other.test/ws"))
        .await
        .unwrap();

    assert_eq!(factory.endpoints(), vec!["wss://other.test/ws".to_string()]);
}

#[tokio::test]
async fn open_failure_reports_error() {
    let factory = MockTransportFactory::new();
    factory.fail_next_open();
    let (bus, manager) = manager(&factory);
    let errors = count_topic(&bus, Topic::Error);

    let err = manager.connect(&alice(), None).await.unwrap_err();

    assert!(matches!(err, PulseError::Transport { .. }));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_ack_times_out() {
    let factory = MockTransportFactory::new().without_auto_ack();
    let (bus, manager) = manager(&factory);
    let errors = count_topic(&bus, Topic::Error);

    let err = manager.connect(&alice(), None).await.unwrap_err();

    assert!(matches!(err, PulseError::Timeout { .. }));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(factory.is_closed());
}

#[tokio::test]
async fn late_manual_ack_registers() {
    let factory = MockTransportFactory::new().without_auto_ack();
    let (_bus, manager) = manager(&factory);

    let acker = factory.clone();
    let ack = tokio::spawn(async move {
        while acker.registrations().is_empty() {
            tokio::task::yield_now().await;
        }
        acker.ack_registration();
    });

    manager.connect(&alice(), None).await.unwrap();
    ack.await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Registered);
}

#[tokio::test]
async fn reserved_events_are_redispatched() {
    let factory = MockTransportFactory::new();
    let (bus, manager) = manager(&factory);
    let notifications = count_topic(&bus, Topic::Notification);
    manager.connect(&alice(), None).await.unwrap();

    factory.inject("notification", notification_json("n1", "Hi"));
    factory.inject("notification", serde_json::json!({"broken": true}));
    factory.inject("typing", serde_json::json!({}));
    factory.inject("notification", notification_json("n2", "Again"));
    settle().await;

    assert_eq!(notifications.load(Ordering::SeqCst), 2);
    assert_eq!(manager.state(), ConnectionState::Registered);
}

#[tokio::test]
async fn send_requires_registration() {
    let factory = MockTransportFactory::new();
    let (_bus, manager) = manager(&factory);

    manager.send(Topic::Sync, serde_json::json!({"kind": "refresh"})).await;
    assert!(factory.sent_frames().is_empty());

    manager.connect(&alice(), None).await.unwrap();
    manager.send(Topic::Sync, serde_json::json!({"kind": "refresh"})).await;

    let sent = factory.sent_frames();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].event, "sync");
}

#[tokio::test]
async fn dropped_channel_raises_error_then_disconnect() {
    let factory = MockTransportFactory::new();
    let (bus, manager) = manager(&factory);
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    bus.on_transport(move |event| {
        let name = match event {
            TransportEvent::Connected { .. } => "connect",
            TransportEvent::Disconnected { .. } => "disconnect",
            TransportEvent::Error { .. } => "error",
        };
        log.lock().unwrap().push(name);
        Ok(())
    });

    manager.connect(&alice(), None).await.unwrap();
    factory.drop_connection();
    settle().await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(*seen.lock().unwrap(), vec!["connect", "error", "disconnect"]);
}

#[tokio::test]
async fn disconnect_closes_channel_and_clears_bus() {
    let factory = MockTransportFactory::new();
    let (bus, manager) = manager(&factory);
    let disconnects = count_topic(&bus, Topic::Disconnect);
    count_topic(&bus, Topic::Notification);
    manager.connect(&alice(), None).await.unwrap();

    manager.disconnect().await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(factory.is_closed());
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(bus.total_subscribers(), 0);

    // Safe to repeat.
    manager.disconnect().await;
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn state_changes_are_observable() {
    let factory = MockTransportFactory::new();
    let (_bus, manager) = manager(&factory);
    let mut states = manager.subscribe_state();

    manager.connect(&alice(), None).await.unwrap();
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), ConnectionState::Registered);

    manager.disconnect().await;
    assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
}
