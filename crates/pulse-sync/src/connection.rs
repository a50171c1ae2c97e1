// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push channel lifecycle and registration handshake.
//!
//! `Disconnected --connect()--> Connecting --"registered" ack--> Registered`.
//! A transport failure or `disconnect()` returns to `Disconnected` and raises
//! `error`/`disconnect` on the bus. Handshakes are serialized by the link
//! lock, so two `connect` calls never race.

use std::sync::Arc;

use pulse_bus::{BusEvent, EventBus, Topic, TransportEvent};
use pulse_config::model::PushConfig;
use pulse_core::{
    ConnectionState, Identity, PulseError, PushFrame, PushTransport, TransportFactory, UserId,
};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outbound handshake event name.
pub const REGISTER_EVENT: &str = "register";
/// Inbound handshake acknowledgement event name.
pub const REGISTERED_EVENT: &str = "registered";

struct ActiveLink {
    identity: Identity,
    transport: Arc<dyn PushTransport>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

/// Owns the push channel of one session.
pub struct ConnectionManager {
    bus: Arc<EventBus>,
    factory: Arc<dyn TransportFactory>,
    config: PushConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    link: Mutex<Option<ActiveLink>>,
}

impl ConnectionManager {
    pub fn new(bus: Arc<EventBus>, factory: Arc<dyn TransportFactory>, config: PushConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            bus,
            factory,
            config,
            state: Arc::new(state),
            link: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Opens the push channel and registers `identity`.
    ///
    /// Returns immediately, without reopening, if already registered as
    /// `identity`. Otherwise any previous channel is closed first. Waits up to
    /// the registration timeout for the broker's ack.
    pub async fn connect(
        &self,
        identity: &Identity,
        endpoint_override: Option<&str>,
    ) -> Result<(), PulseError> {
        let mut link = self.link.lock().await;

        let same_identity = link
            .as_ref()
            .is_some_and(|active| active.identity == *identity);
        if same_identity && self.state() == ConnectionState::Registered {
            info!(user_id = %identity.user_id, "already registered; keeping push channel");
            return Ok(());
        }
        if let Some(stale) = link.take() {
            debug!(user_id = %stale.identity.user_id, "closing previous push channel");
            close_link(stale).await;
        }

        self.set_state(ConnectionState::Connecting);
        let endpoint = endpoint_override.unwrap_or(self.config.endpoint.as_str());
        info!(user_id = %identity.user_id, device = %identity.device, endpoint, "connecting push channel");

        let transport: Arc<dyn PushTransport> = match self.factory.open(endpoint).await {
            Ok(transport) => Arc::from(transport),
            Err(e) => return Err(self.fail(e)),
        };

        let register = PushFrame::new(
            REGISTER_EVENT,
            serde_json::json!({
                "user_id": identity.user_id,
                "device_class": identity.device,
            }),
        );
        if let Err(e) = transport.send(register).await {
            if let Err(close_err) = transport.close().await {
                debug!(error = %close_err, "push channel close failed");
            }
            return Err(self.fail(e));
        }

        let cancel = CancellationToken::new();
        let mut state_rx = self.state.subscribe();
        let reader = tokio::spawn(receive_loop(
            Arc::clone(&transport),
            Arc::clone(&self.bus),
            Arc::clone(&self.state),
            identity.user_id.clone(),
            cancel.clone(),
        ));
        *link = Some(ActiveLink {
            identity: identity.clone(),
            transport,
            cancel,
            reader,
        });

        let timeout = self.config.registration_timeout();
        let outcome = tokio::time::timeout(
            timeout,
            state_rx.wait_for(|state| *state != ConnectionState::Connecting),
        )
        .await
        .map(|changed| changed.map(|state| *state));

        match outcome {
            Ok(Ok(ConnectionState::Registered)) => Ok(()),
            Ok(_) => {
                // The receive loop already raised `error`/`disconnect`.
                if let Some(failed) = link.take() {
                    close_link(failed).await;
                }
                Err(PulseError::transport(
                    "push channel closed before registration was acknowledged",
                ))
            }
            Err(_) => {
                if let Some(failed) = link.take() {
                    close_link(failed).await;
                }
                warn!(user_id = %identity.user_id, ?timeout, "registration not acknowledged in time");
                self.set_state(ConnectionState::Disconnected);
                self.bus
                    .dispatch(&BusEvent::Transport(TransportEvent::Error {
                        message: format!("registration timed out after {timeout:?}"),
                    }));
                Err(PulseError::Timeout { duration: timeout })
            }
        }
    }

    /// Sends an event over the channel. Dropped with a warning when not
    /// registered; there is no send queue.
    pub async fn send(&self, topic: Topic, payload: serde_json::Value) {
        if self.state() != ConnectionState::Registered {
            warn!(%topic, state = %self.state(), "not registered; outbound event dropped");
            return;
        }
        let transport = match self.link.lock().await.as_ref() {
            Some(active) => Arc::clone(&active.transport),
            None => {
                warn!(%topic, "no push channel; outbound event dropped");
                return;
            }
        };
        if let Err(e) = transport.send(PushFrame::new(topic.to_string(), payload)).await {
            warn!(%topic, error = %e, "push send failed");
            self.fail(e);
        }
    }

    /// Closes the channel, raises `disconnect`, and clears every bus
    /// subscription of the session. Safe to call in any state.
    pub async fn disconnect(&self) {
        let active = self.link.lock().await.take();
        let had_link = active.is_some();
        if let Some(active) = active {
            info!(user_id = %active.identity.user_id, "disconnecting push channel");
            close_link(active).await;
        }

        let previous = self.state.send_replace(ConnectionState::Disconnected);
        if had_link || previous != ConnectionState::Disconnected {
            self.bus
                .dispatch(&BusEvent::Transport(TransportEvent::Disconnected {
                    reason: "client disconnect".to_string(),
                }));
        }
        self.bus.clear();
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "connection state changed");
        }
    }

    /// Forces `Disconnected`, raises `error`, and hands `err` back.
    fn fail(&self, err: PulseError) -> PulseError {
        warn!(error = %err, "push transport failed");
        self.set_state(ConnectionState::Disconnected);
        self.bus
            .dispatch(&BusEvent::Transport(TransportEvent::Error {
                message: err.to_string(),
            }));
        err
    }
}

async fn close_link(link: ActiveLink) {
    link.cancel.cancel();
    if let Err(e) = link.transport.close().await {
        debug!(error = %e, "push channel close failed");
    }
    link.reader.abort();
}

async fn receive_loop(
    transport: Arc<dyn PushTransport>,
    bus: Arc<EventBus>,
    state: Arc<watch::Sender<ConnectionState>>,
    user_id: UserId,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = transport.receive() => received,
        };

        match received {
            Ok(frame) => handle_frame(frame, &bus, &state, &user_id),
            Err(e) => {
                if cancel.is_cancelled() {
                    break;
                }
                warn!(user_id = %user_id, error = %e, "push channel lost");
                state.send_replace(ConnectionState::Disconnected);
                bus.dispatch(&BusEvent::Transport(TransportEvent::Error {
                    message: e.to_string(),
                }));
                bus.dispatch(&BusEvent::Transport(TransportEvent::Disconnected {
                    reason: e.to_string(),
                }));
                break;
            }
        }
    }
    debug!(user_id = %user_id, "push receive loop ended");
}

fn handle_frame(
    frame: PushFrame,
    bus: &EventBus,
    state: &watch::Sender<ConnectionState>,
    user_id: &UserId,
) {
    if frame.event == REGISTERED_EVENT {
        let promoted = state.send_if_modified(|current| {
            if *current == ConnectionState::Connecting {
                *current = ConnectionState::Registered;
                true
            } else {
                false
            }
        });
        if promoted {
            info!(user_id = %user_id, "push channel registered");
            bus.dispatch(&BusEvent::Transport(TransportEvent::Connected {
                user_id: user_id.clone(),
            }));
        } else {
            debug!("duplicate registration ack ignored");
        }
        return;
    }

    let topic = match frame.event.parse::<Topic>() {
        Ok(topic) if topic.is_reserved() => topic,
        _ => {
            debug!(event = %frame.event, "ignoring unknown push event");
            return;
        }
    };
    match BusEvent::decode(topic, frame.data) {
        Ok(event) => {
            debug!(%topic, "push event received");
            bus.dispatch(&event);
        }
        Err(e) => warn!(%topic, error = %e, "dropping malformed push event"),
    }
}
