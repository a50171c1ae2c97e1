// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle: start, stop, run, presence.

use std::time::Duration;

use pulse_core::{ConnectionState, DeviceClass, HealthStatus, Identity, PulseError, UserId};
use pulse_sync::shutdown::shutdown_session;
use pulse_test_utils::{AuthorityCall, TestHarness};
use tokio_util::sync::CancellationToken;

fn announced(harness: &TestHarness, online: bool) -> usize {
    harness.authority.count_calls(|c| {
        *c == AuthorityCall::AnnouncePresence {
            user: UserId::from("alice"),
            online,
        }
    })
}

#[tokio::test(start_paused = true)]
async fn start_registers_announces_and_polls() {
    let harness = TestHarness::builder().build();
    harness.start().await.unwrap();
    harness.settle().await;

    assert_eq!(harness.session.state(), ConnectionState::Registered);
    assert_eq!(announced(&harness, true), 1);
    assert!(harness.feed().await.is_polling());
    assert_eq!(
        harness
            .authority
            .count_calls(AuthorityCall::is_fetch_notifications),
        1
    );
    assert_eq!(
        harness.session.identity().await,
        Some(Identity::new("alice", DeviceClass::Desktop))
    );
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_idempotent() {
    let harness = TestHarness::builder().build();
    harness.start().await.unwrap();
    harness.start().await.unwrap();

    assert_eq!(harness.transport.open_count(), 1);
    assert_eq!(harness.transport.registrations().len(), 1);
    assert_eq!(announced(&harness, true), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_tears_everything_down() {
    let harness = TestHarness::builder().build();
    harness.start().await.unwrap();
    let feed = harness.feed().await;
    let conversations = harness.conversations().await;
    conversations.select(&UserId::from("bob")).await;

    harness.session.stop().await;

    assert_eq!(harness.session.state(), ConnectionState::Disconnected);
    assert_eq!(harness.session.bus().total_subscribers(), 0);
    assert!(harness.transport.is_closed());
    assert!(!feed.is_polling());
    assert!(!conversations.is_polling());
    assert_eq!(announced(&harness, false), 1);
    assert!(harness.session.feed().await.is_none());

    harness.authority.clear_calls();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(harness.authority.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_without_start_is_a_no_op() {
    let harness = TestHarness::builder().build();
    harness.session.stop().await;
    assert!(harness.authority.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_start_leaves_nothing_behind() {
    let harness = TestHarness::builder()
        .without_auto_ack()
        .with_registration_timeout(2)
        .build();

    let err = harness.start().await.unwrap_err();

    assert!(matches!(err, PulseError::Timeout { .. }));
    assert_eq!(harness.session.bus().total_subscribers(), 0);
    assert!(harness.session.feed().await.is_none());
    assert_eq!(announced(&harness, true), 0);
}

#[tokio::test(start_paused = true)]
async fn switching_identity_restarts_session() {
    let harness = TestHarness::builder().build();
    harness.start().await.unwrap();

    harness
        .session
        .start(Identity::new("dave", DeviceClass::Tablet))
        .await
        .unwrap();

    assert_eq!(harness.transport.open_count(), 2);
    assert_eq!(announced(&harness, false), 1);
    assert_eq!(
        harness.session.identity().await.map(|i| i.user_id),
        Some(UserId::from("dave"))
    );
}

#[tokio::test(start_paused = true)]
async fn presence_events_and_seeding() {
    let harness = TestHarness::builder().build();
    harness.authority.set_presence("carol", true, Some(DeviceClass::Web));
    harness.authority.set_presence("bob", false, None);
    harness.start().await.unwrap();

    harness.transport.inject(
        "presence_up",
        serde_json::json!({"peer_id": "bob", "device_class": "mobile"}),
    );
    harness.settle().await;

    let presence = harness.session.presence();
    assert!(presence.is_online(&UserId::from("bob")));

    // An event-derived entry wins over the authority's view.
    let bob = harness
        .session
        .seed_presence(&UserId::from("bob"))
        .await
        .unwrap();
    assert!(bob.is_online);

    let carol = harness
        .session
        .seed_presence(&UserId::from("carol"))
        .await
        .unwrap();
    assert!(carol.is_online);
    assert_eq!(carol.device_class, Some(DeviceClass::Web));

    harness
        .transport
        .inject("presence_down", serde_json::json!({"peer_id": "bob"}));
    harness.settle().await;
    assert_eq!(presence.online_peers(), vec![UserId::from("carol")]);
}

#[tokio::test(start_paused = true)]
async fn run_stops_session_on_cancel() {
    let harness = TestHarness::builder().build();
    harness.start().await.unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });
    harness.session.run(cancel).await;

    assert_eq!(harness.session.state(), ConnectionState::Disconnected);
    assert_eq!(announced(&harness, false), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_channel_keeps_polling_until_cancel() {
    let harness = TestHarness::builder().build();
    harness.start().await.unwrap();
    harness.settle().await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    let transport = harness.transport.clone();
    tokio::spawn(async move {
        transport.drop_connection();
        tokio::time::sleep(Duration::from_secs(61)).await;
        trigger.cancel();
    });
    harness.session.run(cancel).await;

    // Polls at 0s and 60s, no reconnect.
    assert_eq!(
        harness
            .authority
            .count_calls(AuthorityCall::is_fetch_notifications),
        2
    );
    assert_eq!(harness.transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_reports_adapter_health() {
    let harness = TestHarness::builder().build();
    harness.start().await.unwrap();

    let health = harness.session.health().await;
    assert_eq!(
        health,
        vec![
            ("mock-transport".to_string(), HealthStatus::Healthy),
            ("mock-authority".to_string(), HealthStatus::Healthy),
        ]
    );

    assert!(shutdown_session(&harness.session, Duration::from_secs(5)).await);
    assert_eq!(harness.session.state(), ConnectionState::Disconnected);
}
