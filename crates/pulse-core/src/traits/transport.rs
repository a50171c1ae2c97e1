// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push channel traits.

use async_trait::async_trait;

use crate::error::PulseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::PushFrame;

/// An open, persistent push channel.
///
/// `receive()` is only ever polled by one task (the connection's receive
/// loop); `send()` may be called concurrently with it.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Sends one frame to the broker.
    async fn send(&self, frame: PushFrame) -> Result<(), PulseError>;

    /// Waits for the next inbound frame.
    ///
    /// Returns a [`PulseError::Transport`] once the channel is closed.
    async fn receive(&self) -> Result<PushFrame, PulseError>;

    /// Closes the channel. Idempotent.
    async fn close(&self) -> Result<(), PulseError>;
}

/// Opens push channels. Injected into the connection manager.
#[async_trait]
pub trait TransportFactory: PluginAdapter {
    /// Opens a channel to `endpoint`. A returned transport is "open".
    async fn open(&self, endpoint: &str) -> Result<Box<dyn PushTransport>, PulseError>;
}
