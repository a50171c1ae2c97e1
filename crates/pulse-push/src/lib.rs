// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket push-channel transport for the Pulse sync core.
//!
//! [`WsTransportFactory`] opens one WebSocket per session. Frames travel as
//! JSON text messages of the form `{"event": "<name>", "data": <json>}`.

pub mod transport;

use async_trait::async_trait;
use pulse_core::traits::{PluginAdapter, PushTransport, TransportFactory};
use pulse_core::{AdapterType, HealthStatus, PulseError};
use tracing::{debug, info};

pub use transport::WsTransport;

/// Opens WebSocket push channels.
#[derive(Debug, Default, Clone)]
pub struct WsTransportFactory;

impl WsTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginAdapter for WsTransportFactory {
    fn name(&self) -> &str {
        "websocket"
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
        debug!("websocket transport factory shutting down");
        Ok(())
    }
}

#[async_trait]
impl TransportFactory for WsTransportFactory {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn PushTransport>, PulseError> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| PulseError::Transport {
                message: format!("failed to open push channel to {endpoint}: {e}"),
                source: Some(Box::new(e)),
            })?;
        info!(endpoint, status = %response.status(), "push channel opened");
        Ok(Box::new(WsTransport::new(stream)))
    }
}
