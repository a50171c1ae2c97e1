// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes and non-zero intervals.

use crate::diagnostic::ConfigError;
use crate::model::PulseConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PulseConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config
        .session
        .user_id
        .as_deref()
        .is_some_and(|user_id| user_id.trim().is_empty())
    {
        errors.push(ConfigError::Validation {
            message: "session.user_id must not be empty when set".to_string(),
        });
    }

    let urls = [
        ("push.endpoint", config.push.endpoint.as_str(), &["ws://", "wss://"]),
        ("api.base_url", config.api.base_url.as_str(), &["http://", "https://"]),
    ];
    for (key, value, schemes) in urls {
        let value = value.trim();
        if !schemes.iter().any(|scheme| value.starts_with(scheme)) {
            errors.push(ConfigError::UnsupportedScheme {
                key: key.to_string(),
                value: value.to_string(),
                expected: schemes.join(" or "),
            });
        }
    }

    let positive = [
        (
            "push.registration_timeout_secs",
            config.push.registration_timeout_secs,
        ),
        ("api.request_timeout_secs", config.api.request_timeout_secs),
        (
            "polling.notification_interval_secs",
            config.polling.notification_interval_secs,
        ),
        (
            "polling.conversation_interval_secs",
            config.polling.conversation_interval_secs,
        ),
        ("feed.capacity", config.feed.capacity as u64),
        ("upload.max_attachments", config.upload.max_attachments as u64),
        ("upload.max_attachment_bytes", config.upload.max_attachment_bytes),
    ];
    for (key, value) in positive {
        if value == 0 {
            errors.push(ConfigError::NonPositive {
                key: key.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
