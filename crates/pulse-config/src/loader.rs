// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pulse.toml` > `~/.config/pulse/pulse.toml` > `/etc/pulse/pulse.toml`
//! with environment variable overrides via `PULSE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PulseConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pulse/pulse.toml` (system-wide)
/// 3. `~/.config/pulse/pulse.toml` (user XDG config)
/// 4. `./pulse.toml` (local directory)
/// 5. `PULSE_*` environment variables
pub fn load_config() -> Result<PulseConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<PulseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PulseConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PulseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PulseConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PulseConfig::default()))
        .merge(Toml::file("/etc/pulse/pulse.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("pulse/pulse.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("pulse.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: `PULSE_SESSION_USER_ID`
/// must map to `session.user_id`, not `session.user.id`.
fn env_provider() -> Env {
    Env::prefixed("PULSE_").map(|key| {
        let mapped = key
            .as_str()
            .replacen("session_", "session.", 1)
            .replacen("push_", "push.", 1)
            .replacen("api_", "api.", 1)
            .replacen("polling_", "polling.", 1)
            .replacen("feed_", "feed.", 1)
            .replacen("upload_", "upload.", 1);
        mapped.into()
    })
}
