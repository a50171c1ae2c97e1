// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single open WebSocket push channel.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use pulse_core::traits::PushTransport;
use pulse_core::{PulseError, PushFrame};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket push channel split into independently locked halves, so the
/// receive loop never blocks outbound sends.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WsTransport {
    pub fn new(stream: WsStream) -> Self {
        let (sink, stream) = stream.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn send(&self, frame: PushFrame) -> Result<(), PulseError> {
        let json = serde_json::to_string(&frame).map_err(|e| PulseError::Transport {
            message: format!("failed to encode `{}` frame: {e}", frame.event),
            source: Some(Box::new(e)),
        })?;
        debug!(event = %frame.event, "sending push frame");
        self.sink
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| PulseError::Transport {
                message: format!("failed to send `{}` frame: {e}", frame.event),
                source: Some(Box::new(e)),
            })
    }

    async fn receive(&self) -> Result<PushFrame, PulseError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<PushFrame>(&text) {
                    Ok(frame) => return Ok(frame),
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable push frame");
                    }
                },
                Some(Ok(Message::Binary(bytes))) => {
                    match serde_json::from_slice::<PushFrame>(&bytes) {
                        Ok(frame) => return Ok(frame),
                        Err(e) => warn!(error = %e, "dropping undecodable binary push frame"),
                    }
                }
                Some(Ok(Message::Close(reason))) => {
                    let reason = reason
                        .map(|r| r.reason.as_str().to_string())
                        .unwrap_or_else(|| "no reason given".to_string());
                    return Err(PulseError::transport(format!(
                        "push channel closed by peer: {reason}"
                    )));
                }
                Some(Ok(_)) => {
                    // Ping/pong and raw frames; tungstenite answers pings itself.
                }
                Some(Err(e)) => {
                    return Err(PulseError::Transport {
                        message: format!("push channel read failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
                None => return Err(PulseError::transport("push channel ended")),
            }
        }
    }

    async fn close(&self) -> Result<(), PulseError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| PulseError::Transport {
                message: format!("failed to close push channel: {e}"),
                source: Some(Box::new(e)),
            })
    }
}
