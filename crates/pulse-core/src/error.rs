// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pulse sync core.

use thiserror::Error;

/// Boxed source error carried by the network-facing variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Pulse adapter traits and core operations.
///
/// No variant is fatal to the process. Every error is terminal at the
/// boundary where it occurs: the worst outcome is stale local state until
/// the next poll re-establishes ground truth.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Configuration errors (invalid values, missing identity).
    #[error("configuration error: {0}")]
    Config(String),

    /// Push channel errors (connect, handshake, send, receive).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<BoxError>,
    },

    /// A poll fetch against the remote authority failed.
    #[error("poll error: {message}")]
    Poll {
        message: String,
        source: Option<BoxError>,
    },

    /// A remote write (send, mark-read, presence announce) failed.
    #[error("request error: {message}")]
    Request {
        message: String,
        source: Option<BoxError>,
    },

    /// A dispatched subscriber callback returned an error or panicked.
    #[error("subscriber error on `{topic}`: {message}")]
    Subscriber { topic: String, message: String },

    /// An attachment bundle was rejected as a whole.
    #[error("upload error: {message}")]
    Upload {
        message: String,
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PulseError {
    /// Shorthand for a [`PulseError::Transport`] without a source.
    pub fn transport(message: impl Into<String>) -> Self {
        PulseError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`PulseError::Poll`] without a source.
    pub fn poll(message: impl Into<String>) -> Self {
        PulseError::Poll {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`PulseError::Request`] without a source.
    pub fn request(message: impl Into<String>) -> Self {
        PulseError::Request {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`PulseError::Upload`] without a source.
    pub fn upload(message: impl Into<String>) -> Self {
        PulseError::Upload {
            message: message.into(),
            source: None,
        }
    }
}
