// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pulse watch` command implementation.
//!
//! Starts a session against the configured push broker and remote authority
//! and logs every feed, message and presence event until a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use pulse_api::HttpAuthority;
use pulse_bus::TransportEvent;
use pulse_config::PulseConfig;
use pulse_core::{DeviceClass, Identity, PulseError};
use pulse_push::WsTransportFactory;
use pulse_sync::SyncSession;
use pulse_sync::shutdown;
use tracing::{info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Command-line overrides for `pulse watch`.
#[derive(Debug, Default)]
pub struct WatchOptions {
    pub user: Option<String>,
    pub device: Option<DeviceClass>,
    pub endpoint: Option<String>,
}

/// Applies command-line overrides and resolves the session identity.
pub fn resolve(
    mut config: PulseConfig,
    options: WatchOptions,
) -> Result<(PulseConfig, Identity), PulseError> {
    if let Some(endpoint) = options.endpoint {
        config.push.endpoint = endpoint;
    }
    let user = options
        .user
        .or_else(|| config.session.user_id.clone())
        .filter(|user| !user.trim().is_empty())
        .ok_or_else(|| {
            PulseError::Config(
                "no user to register as; pass --user or set session.user_id".to_string(),
            )
        })?;
    let device = options.device.unwrap_or(config.session.device_class);
    Ok((config, Identity::new(user, device)))
}

/// Runs the `pulse watch` command.
pub async fn run_watch(config: PulseConfig, options: WatchOptions) -> Result<(), PulseError> {
    init_tracing(&config.session.log_level);

    let (config, identity) = resolve(config, options)?;
    let authority = Arc::new(HttpAuthority::new(&config.api)?);
    let session = SyncSession::new(config, Arc::new(WsTransportFactory::new()), authority);

    log_events(&session);
    let cancel = shutdown::install_signal_handler();

    session.start(identity).await?;
    for (adapter, status) in session.health().await {
        info!(adapter = %adapter, ?status, "adapter health");
    }

    // `run` stops the session on cancel; the final pass also shuts the
    // adapters down.
    session.run(cancel).await;
    shutdown::shutdown_session(&session, SHUTDOWN_TIMEOUT).await;
    Ok(())
}

/// Subscribes loggers for every topic the session receives.
///
/// Registered before `start` and cleared with the rest of the bus on stop.
fn log_events(session: &SyncSession) {
    let bus = session.bus();
    bus.on_notification(|record| {
        info!(id = %record.id, title = %record.title, "notification");
        Ok(())
    });
    bus.on_message(|message| {
        info!(
            id = %message.id,
            from = %message.sender_id,
            to = %message.receiver_id,
            attachments = message.attachments.len(),
            "message"
        );
        Ok(())
    });
    bus.on_presence(|event, online| {
        info!(peer_id = %event.peer_id, online, device = ?event.device_class, "presence");
        Ok(())
    });
    bus.on_sync(|event| {
        info!(kind = %event.kind, peer_id = ?event.peer_id, "sync");
        Ok(())
    });
    bus.on_transport(|event| {
        match event {
            TransportEvent::Connected { user_id } => info!(user_id = %user_id, "registered"),
            TransportEvent::Disconnected { reason } => info!(reason = %reason, "disconnected"),
            TransportEvent::Error { message } => warn!(message = %message, "transport error"),
        }
        Ok(())
    });
}

/// Initializes the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pulse={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
