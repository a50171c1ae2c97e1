// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that [`SyncSession::run`] monitors. The session is
//! then stopped within a bounded time before the process exits.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::SyncSession;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
/// The signal handler task runs in the background until the token is cancelled.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = token_clone.cancelled() => return,
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable; listening for Ctrl+C only");
                    tokio::select! {
                        _ = token_clone.cancelled() => return,
                        _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = token_clone.cancelled() => return,
                _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Stops `session` and shuts its adapters down, giving up after `timeout`.
///
/// Returns `false` if the deadline passed first. The push channel is then
/// left to close when the process exits.
pub async fn shutdown_session(session: &SyncSession, timeout: Duration) -> bool {
    let graceful = async {
        session.stop().await;
        session.shutdown_adapters().await;
    };
    match tokio::time::timeout(timeout, graceful).await {
        Ok(()) => {
            info!("session shut down cleanly");
            true
        }
        Err(_) => {
            warn!(?timeout, "session shutdown timed out");
            false
        }
    }
}
