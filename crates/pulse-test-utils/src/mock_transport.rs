// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory push channel for deterministic testing.
//!
//! `MockTransportFactory` implements `TransportFactory`. Every `open()` creates
//! a fresh [`MockTransport`] and makes it the current link. Tests inject
//! inbound frames into the current link and inspect every frame the client
//! sent. By default a `register` frame is answered with `registered`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pulse_core::{
    AdapterType, HealthStatus, PluginAdapter, PulseError, PushFrame, PushTransport,
    TransportFactory,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

enum Inbound {
    Frame(PushFrame),
    Drop,
}

struct Link {
    inbound: Mutex<VecDeque<Inbound>>,
    notify: Notify,
    closed: CancellationToken,
}

impl Link {
    fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: CancellationToken::new(),
        }
    }

    fn push(&self, item: Inbound) {
        guard(&self.inbound).push_back(item);
        self.notify.notify_one();
    }
}

#[derive(Default)]
struct Shared {
    endpoints: Vec<String>,
    sent: Vec<PushFrame>,
    current: Option<Arc<Link>>,
    manual_ack: bool,
    fail_next_open: bool,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scriptable push broker.
///
/// Clones share state, so a test can keep one handle while the session owns
/// another.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    shared: Arc<Mutex<Shared>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops answering `register` automatically; use [`ack_registration`](Self::ack_registration).
    pub fn without_auto_ack(self) -> Self {
        guard(&self.shared).manual_ack = true;
        self
    }

    /// Makes the next `open()` fail with a transport error.
    pub fn fail_next_open(&self) {
        guard(&self.shared).fail_next_open = true;
    }

    /// Delivers `{event, data}` on the current link.
    pub fn inject(&self, event: &str, data: serde_json::Value) {
        self.inject_frame(PushFrame::new(event, data));
    }

    pub fn inject_frame(&self, frame: PushFrame) {
        if let Some(link) = self.current() {
            link.push(Inbound::Frame(frame));
        }
    }

    pub fn ack_registration(&self) {
        self.inject("registered", serde_json::Value::Null);
    }

    /// Fails the next `receive()` on the current link, as a broker crash would.
    pub fn drop_connection(&self) {
        if let Some(link) = self.current() {
            link.push(Inbound::Drop);
        }
    }

    /// Number of channels opened so far.
    pub fn open_count(&self) -> usize {
        guard(&self.shared).endpoints.len()
    }

    pub fn endpoints(&self) -> Vec<String> {
        guard(&self.shared).endpoints.clone()
    }

    /// Every frame the client sent, across all links.
    pub fn sent_frames(&self) -> Vec<PushFrame> {
        guard(&self.shared).sent.clone()
    }

    /// The `register` frames sent so far.
    pub fn registrations(&self) -> Vec<PushFrame> {
        guard(&self.shared)
            .sent
            .iter()
            .filter(|frame| frame.event == "register")
            .cloned()
            .collect()
    }

    /// Whether the current link has been closed by the client.
    pub fn is_closed(&self) -> bool {
        self.current().is_none_or(|link| link.closed.is_cancelled())
    }

    fn current(&self) -> Option<Arc<Link>> {
        guard(&self.shared).current.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockTransportFactory {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PushTransport
    }

    async fn health_check(&self) -> Result<HealthStatus, PulseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PulseError> {
        Ok(())
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn PushTransport>, PulseError> {
        let mut shared = guard(&self.shared);
        if std::mem::take(&mut shared.fail_next_open) {
            return Err(PulseError::transport(format!(
                "mock broker refused connection to {endpoint}"
            )));
        }
        let link = Arc::new(Link::new());
        shared.endpoints.push(endpoint.to_string());
        shared.current = Some(Arc::clone(&link));
        Ok(Box::new(MockTransport {
            link,
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// One open link of a [`MockTransportFactory`].
pub struct MockTransport {
    link: Arc<Link>,
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl PushTransport for MockTransport {
    async fn send(&self, frame: PushFrame) -> Result<(), PulseError> {
        if self.link.closed.is_cancelled() {
            return Err(PulseError::transport("mock link is closed"));
        }
        let is_register = frame.event == "register";
        let auto_ack = {
            let mut shared = guard(&self.shared);
            shared.sent.push(frame);
            !shared.manual_ack
        };
        if is_register && auto_ack {
            self.link.push(Inbound::Frame(PushFrame::new(
                "registered",
                serde_json::Value::Null,
            )));
        }
        Ok(())
    }

    async fn receive(&self) -> Result<PushFrame, PulseError> {
        loop {
            let next = guard(&self.link.inbound).pop_front();
            match next {
                Some(Inbound::Frame(frame)) => return Ok(frame),
                Some(Inbound::Drop) => {
                    return Err(PulseError::transport("mock broker dropped the connection"));
                }
                None if self.link.closed.is_cancelled() => {
                    return Err(PulseError::transport("mock link is closed"));
                }
                None => {
                    tokio::select! {
                        _ = self.link.notify.notified() => {}
                        _ = self.link.closed.cancelled() => {}
                    }
                }
            }
        }
    }

    async fn close(&self) -> Result<(), PulseError> {
        self.link.closed.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_is_acknowledged() {
        let factory = MockTransportFactory::new();
        let transport = factory.open("ws://mock").await.unwrap();

        transport
            .send(PushFrame::new("register", serde_json::json!({"user_id": "alice"})))
            .await
            .unwrap();

        let ack = transport.receive().await.unwrap();
        assert_eq!(ack.event, "registered");
        assert_eq!(factory.registrations().len(), 1);
        assert_eq!(factory.open_count(), 1);
    }

    #[tokio::test]
    async fn manual_ack_holds_registration() {
        let factory = MockTransportFactory::new().without_auto_ack();
        let transport = factory.open("ws://mock").await.unwrap();
        transport
            .send(PushFrame::new("register", serde_json::Value::Null))
            .await
            .unwrap();

        factory.inject("notification", serde_json::json!({"id": "n1"}));
        let frame = transport.receive().await.unwrap();
        assert_eq!(frame.event, "notification");
    }

    #[tokio::test]
    async fn close_ends_receive() {
        let factory = MockTransportFactory::new();
        let transport = factory.open("ws://mock").await.unwrap();
        transport.close().await.unwrap();

        assert!(transport.receive().await.is_err());
        assert!(transport.send(PushFrame::new("x", serde_json::Value::Null)).await.is_err());
        assert!(factory.is_closed());
    }

    #[tokio::test]
    async fn dropped_connection_fails_receive() {
        let factory = MockTransportFactory::new();
        let transport = factory.open("ws://mock").await.unwrap();
        factory.drop_connection();
        assert!(transport.receive().await.is_err());
    }

    #[tokio::test]
    async fn fail_next_open_applies_once() {
        let factory = MockTransportFactory::new();
        factory.fail_next_open();
        assert!(factory.open("ws://mock").await.is_err());
        assert!(factory.open("ws://mock").await.is_ok());
        assert_eq!(factory.endpoints(), vec!["ws://mock".to_string()]);
    }
}
