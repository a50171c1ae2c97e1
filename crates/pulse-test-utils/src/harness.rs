// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a [`SyncSession`] over a [`MockTransportFactory`]
//! and a [`MockAuthority`], so a test can drive pushes and polls and then
//! assert on the synchronizers and the recorded calls.

use std::sync::Arc;

use pulse_config::PulseConfig;
use pulse_core::{DeviceClass, Identity, PulseError};
use pulse_sync::{ConversationSynchronizer, FeedSynchronizer, SyncSession};

use crate::mock_authority::MockAuthority;
use crate::mock_transport::MockTransportFactory;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    user: String,
    device: DeviceClass,
    config: PulseConfig,
    auto_ack: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            user: "alice".to_string(),
            device: DeviceClass::Desktop,
            config: PulseConfig::default(),
            auto_ack: true,
        }
    }

    /// Identity the session registers as.
    pub fn with_user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    pub fn with_device(mut self, device: DeviceClass) -> Self {
        self.device = device;
        self
    }

    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.config.feed.capacity = capacity;
        self
    }

    pub fn with_notification_interval(mut self, secs: u64) -> Self {
        self.config.polling.notification_interval_secs = secs;
        self
    }

    pub fn with_conversation_interval(mut self, secs: u64) -> Self {
        self.config.polling.conversation_interval_secs = secs;
        self
    }

    pub fn with_registration_timeout(mut self, secs: u64) -> Self {
        self.config.push.registration_timeout_secs = secs;
        self
    }

    /// The mock broker will not answer `register` on its own.
    pub fn without_auto_ack(mut self) -> Self {
        self.auto_ack = false;
        self
    }

    /// Build the harness. The session is not started.
    pub fn build(self) -> TestHarness {
        let transport = if self.auto_ack {
            MockTransportFactory::new()
        } else {
            MockTransportFactory::new().without_auto_ack()
        };
        let authority = Arc::new(MockAuthority::new());
        let session = SyncSession::new(
            self.config,
            Arc::new(transport.clone()),
            Arc::clone(&authority) as Arc<dyn pulse_core::RemoteAuthority>,
        );
        TestHarness {
            session,
            transport,
            authority,
            identity: Identity::new(self.user.as_str(), self.device),
        }
    }
}

/// A session wired to in-memory adapters.
pub struct TestHarness {
    /// The session under test.
    pub session: SyncSession,
    /// Handle to the mock push broker.
    pub transport: MockTransportFactory,
    /// Handle to the mock remote authority.
    pub authority: Arc<MockAuthority>,
    /// Identity used by [`start`](Self::start).
    pub identity: Identity,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Starts the session as the harness identity.
    pub async fn start(&self) -> Result<(), PulseError> {
        self.session.start(self.identity.clone()).await
    }

    /// Feed synchronizer of the running session.
    ///
    /// # Panics
    ///
    /// If the session is not started.
    pub async fn feed(&self) -> Arc<FeedSynchronizer> {
        self.session
            .feed()
            .await
            .expect("session not started; call start() first")
    }

    /// Conversation synchronizer of the running session.
    ///
    /// # Panics
    ///
    /// If the session is not started.
    pub async fn conversations(&self) -> Arc<ConversationSynchronizer> {
        self.session
            .conversations()
            .await
            .expect("session not started; call start() first")
    }

    /// Lets spawned tasks (receive loop, poll tasks) run until they block.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}
