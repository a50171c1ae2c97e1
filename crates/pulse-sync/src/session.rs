// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session orchestration.
//!
//! A [`SyncSession`] is the single owner of everything one identity needs:
//! the push connection, the presence directory, and the two synchronizers
//! with their poll tasks. Dependencies are injected at construction; nothing
//! is global, so tests can run several sessions side by side.

use std::sync::Arc;

use pulse_bus::EventBus;
use pulse_config::PulseConfig;
use pulse_core::{
    ConnectionState, HealthStatus, Identity, PresenceRecord, PulseError, RemoteAuthority,
    TransportFactory, UserId,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::conversation::ConversationSynchronizer;
use crate::feed::FeedSynchronizer;
use crate::presence::PresenceTracker;
use crate::upload::UploadCoordinator;

struct ActiveSession {
    identity: Identity,
    feed: Arc<FeedSynchronizer>,
    conversations: Arc<ConversationSynchronizer>,
}

/// One identity's synchronization session.
pub struct SyncSession {
    config: PulseConfig,
    bus: Arc<EventBus>,
    factory: Arc<dyn TransportFactory>,
    authority: Arc<dyn RemoteAuthority>,
    connection: ConnectionManager,
    presence: PresenceTracker,
    active: Mutex<Option<ActiveSession>>,
}

impl SyncSession {
    pub fn new(
        config: PulseConfig,
        factory: Arc<dyn TransportFactory>,
        authority: Arc<dyn RemoteAuthority>,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let connection =
            ConnectionManager::new(Arc::clone(&bus), Arc::clone(&factory), config.push.clone());
        Self {
            config,
            bus,
            factory,
            authority,
            connection,
            presence: PresenceTracker::new(),
            active: Mutex::new(None),
        }
    }

    /// Starts a session for `identity`.
    ///
    /// Subscribes the synchronizers, registers on the push channel, announces
    /// this identity online, starts the notification poll, and loads the
    /// conversation list. Calling it again for the identity that is already
    /// registered does nothing; calling it for another identity stops the
    /// current session first.
    pub async fn start(&self, identity: Identity) -> Result<(), PulseError> {
        let mut active = self.active.lock().await;

        if let Some(current) = active.as_ref() {
            if current.identity == identity
                && self.connection.state() == ConnectionState::Registered
            {
                info!(user_id = %identity.user_id, "session already running");
                return Ok(());
            }
        }
        if let Some(previous) = active.take() {
            self.teardown(previous).await;
        }

        let user = identity.user_id.clone();
        info!(user_id = %user, device = %identity.device, "starting session");

        let feed = Arc::new(FeedSynchronizer::new(
            user.clone(),
            Arc::clone(&self.authority),
            self.config.feed.capacity,
            self.config.polling.notification_interval(),
        ));
        let conversations = Arc::new(ConversationSynchronizer::new(
            user.clone(),
            Arc::clone(&self.authority),
            UploadCoordinator::new(Arc::clone(&self.authority), self.config.upload.clone()),
            self.config.polling.conversation_interval(),
        ));

        feed.attach(&self.bus);
        conversations.attach(&self.bus);
        self.presence.attach(&self.bus);

        if let Err(e) = self.connection.connect(&identity, None).await {
            warn!(user_id = %user, error = %e, "session start failed");
            feed.detach(&self.bus);
            conversations.detach(&self.bus);
            self.presence.detach(&self.bus);
            self.bus.clear();
            self.presence.reset();
            return Err(e);
        }

        if let Err(e) = self.authority.announce_presence(&user, true).await {
            warn!(user_id = %user, error = %e, "announcing online presence failed");
        }

        feed.start_polling();
        if let Err(e) = conversations.refresh_conversations().await {
            warn!(user_id = %user, error = %e, "loading conversation list failed");
        }
        if let Err(e) = conversations.refresh_unread().await {
            warn!(user_id = %user, error = %e, "loading unread message count failed");
        }

        *active = Some(ActiveSession {
            identity,
            feed,
            conversations,
        });
        info!(user_id = %user, "session started");
        Ok(())
    }

    /// Ends the session: cancels both poll tasks, unsubscribes, announces
    /// this identity offline, and disconnects. No-op when nothing is running.
    pub async fn stop(&self) {
        match self.active.lock().await.take() {
            Some(active) => self.teardown(active).await,
            None => debug!("no session to stop"),
        }
    }

    /// Drives the session until `cancel` fires, then stops it.
    ///
    /// A lost push channel is logged and not reopened; the poll tasks keep
    /// the local state current in the meantime.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut state = self.connection.subscribe_state();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *state.borrow_and_update();
                    debug!(state = %current, "connection state observed");
                    if current == ConnectionState::Disconnected {
                        warn!("push channel lost; continuing on polls only");
                    }
                }
            }
        }
        info!("session shutting down");
        self.stop().await;
    }

    /// Looks up a peer's presence from the authority unless a presence event
    /// already set it.
    pub async fn seed_presence(&self, peer: &UserId) -> Result<PresenceRecord, PulseError> {
        self.presence.seed(peer, self.authority.as_ref()).await
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.active.lock().await.as_ref().map(|a| a.identity.clone())
    }

    /// Feed synchronizer of the running session.
    pub async fn feed(&self) -> Option<Arc<FeedSynchronizer>> {
        self.active.lock().await.as_ref().map(|a| Arc::clone(&a.feed))
    }

    /// Conversation synchronizer of the running session.
    pub async fn conversations(&self) -> Option<Arc<ConversationSynchronizer>> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| Arc::clone(&a.conversations))
    }

    /// Health of the injected adapters, keyed by adapter name.
    pub async fn health(&self) -> Vec<(String, HealthStatus)> {
        let transport = self
            .factory
            .health_check()
            .await
            .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        let authority = self
            .authority
            .health_check()
            .await
            .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        vec![
            (self.factory.name().to_string(), transport),
            (self.authority.name().to_string(), authority),
        ]
    }

    /// Shuts the injected adapters down. Call after [`stop`](Self::stop).
    pub async fn shutdown_adapters(&self) {
        if let Err(e) = self.factory.shutdown().await {
            warn!(adapter = self.factory.name(), error = %e, "adapter shutdown failed");
        }
        if let Err(e) = self.authority.shutdown().await {
            warn!(adapter = self.authority.name(), error = %e, "adapter shutdown failed");
        }
    }

    async fn teardown(&self, active: ActiveSession) {
        let user = active.identity.user_id;
        info!(user_id = %user, "stopping session");

        active.feed.stop_polling();
        active.conversations.reset();
        active.feed.detach(&self.bus);
        active.conversations.detach(&self.bus);
        self.presence.detach(&self.bus);

        if let Err(e) = self.authority.announce_presence(&user, false).await {
            warn!(user_id = %user, error = %e, "announcing offline presence failed");
        }

        self.connection.disconnect().await;
        active.feed.reset();
        self.presence.reset();
        info!(user_id = %user, "session stopped");
    }
}
