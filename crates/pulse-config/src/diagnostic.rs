// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Miette diagnostics for `pulse.toml`.
//!
//! Figment errors are mapped onto the six sections of the Pulse config
//! (`session`, `push`, `api`, `polling`, `feed`, `upload`). Unknown keys get a
//! Jaro-Winkler "did you mean" suggestion; a key written outside its section
//! is pointed back to the section that owns it. Spans are resolved against
//! the TOML text so the rendered report underlines the offending key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Below this Jaro-Winkler score no suggestion is offered.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Name used for TOML text that did not come from a file.
pub const INLINE_SOURCE: &str = "<inline>";

/// Keys accepted in each section of `pulse.toml`.
pub const SECTIONS: &[(&str, &[&str])] = &[
    ("session", &["user_id", "device_class", "log_level"]),
    ("push", &["endpoint", "registration_timeout_secs"]),
    ("api", &["base_url", "request_timeout_secs"]),
    (
        "polling",
        &["notification_interval_secs", "conversation_interval_secs"],
    ),
    ("feed", &["capacity"]),
    ("upload", &["max_attachments", "max_attachment_bytes"]),
];

/// A configuration error with enough context for miette to render it.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key no section recognizes, or an unknown section.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(pulse::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted where `key` was found.
        valid_keys: String,
        #[label("not a pulse setting here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A section key written at the top level of the file.
    #[error("`{key}` belongs in the [{section}] section")]
    #[diagnostic(
        code(pulse::config::misplaced_key),
        help("move `{key}` below a `[{section}]` header")
    )]
    MisplacedKey {
        key: String,
        section: String,
        #[label("outside [{section}]")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not fit the key (wrong type or unknown variant).
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(pulse::config::invalid_value), help("expected {expected}"))]
    InvalidValue {
        /// Dotted path, e.g. `feed.capacity`.
        key: String,
        detail: String,
        expected: String,
        #[label("this value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A URL whose scheme the consuming adapter cannot speak.
    #[error("`{key}` has an unsupported scheme: `{value}`")]
    #[diagnostic(
        code(pulse::config::unsupported_scheme),
        help("use a {expected} URL")
    )]
    UnsupportedScheme {
        key: String,
        value: String,
        /// Human list of accepted schemes, e.g. "ws:// or wss://".
        expected: String,
    },

    /// An interval, timeout or limit that must be at least one.
    #[error("`{key}` must be greater than zero")]
    #[diagnostic(
        code(pulse::config::non_positive),
        help("remove `{key}` to use the default, or set it to 1 or more")
    )]
    NonPositive { key: String },

    /// Any other semantic check.
    #[error("validation error: {message}")]
    #[diagnostic(code(pulse::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(pulse::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Section that owns `key`, if any.
pub fn owning_section(key: &str) -> Option<&'static str> {
    SECTIONS
        .iter()
        .find(|(_, keys)| keys.contains(&key))
        .map(|(section, _)| *section)
}

fn section_names() -> Vec<&'static str> {
    SECTIONS.iter().map(|(section, _)| *section).collect()
}

/// Best match for `unknown` among `candidates`, if any is close enough.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|&candidate| (candidate, strsim::jaro_winkler(unknown, candidate)))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate.to_string())
}

/// Convert a `figment::Error` into one diagnostic per underlying error.
///
/// `toml_sources` pairs a file path (or [`INLINE_SOURCE`]) with its text and
/// is only used to resolve spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    // The path may or may not end with the field itself.
                    let section = path.first().filter(|s| *s != field).map(String::as_str);
                    let source = source_for(&error, toml_sources);
                    unknown_field(field, section, expected, source)
                }
                Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
                    invalid_value(
                        &error,
                        &path,
                        format!("found {actual}"),
                        expected.clone(),
                        toml_sources,
                    )
                }
                Kind::UnknownVariant(actual, variants) => invalid_value(
                    &error,
                    &path,
                    format!("`{actual}` is not recognized"),
                    format!("one of: {}", variants.join(", ")),
                    toml_sources,
                ),
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn unknown_field(
    field: &str,
    section: Option<&str>,
    expected: &[&str],
    source: Option<(&str, &str)>,
) -> ConfigError {
    let (span, src) = locate(source, section, field);

    let Some(section) = section else {
        if let Some(owner) = owning_section(field) {
            return ConfigError::MisplacedKey {
                key: field.to_string(),
                section: owner.to_string(),
                span,
                src,
            };
        }
        let sections = section_names();
        return ConfigError::UnknownKey {
            key: field.to_string(),
            suggestion: suggest_key(field, &sections),
            valid_keys: sections.join(", "),
            span,
            src,
        };
    };

    let valid: Vec<&str> = if expected.is_empty() {
        SECTIONS
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, keys)| keys.to_vec())
            .unwrap_or_default()
    } else {
        expected.to_vec()
    };
    ConfigError::UnknownKey {
        key: field.to_string(),
        suggestion: suggest_key(field, &valid),
        valid_keys: valid.join(", "),
        span,
        src,
    }
}

fn invalid_value(
    error: &figment::Error,
    path: &[String],
    detail: String,
    expected: String,
    toml_sources: &[(String, String)],
) -> ConfigError {
    let (section, field) = match path {
        [section, .., field] => (Some(section.as_str()), field.as_str()),
        [field] => (None, field.as_str()),
        [] => (None, ""),
    };
    let (span, src) = if field.is_empty() {
        (None, None)
    } else {
        locate(source_for(error, toml_sources), section, field)
    };
    ConfigError::InvalidValue {
        key: path.join("."),
        detail,
        expected,
        span,
        src,
    }
}

/// The TOML text an error came from, as `(name, content)`.
fn source_for<'a>(
    error: &figment::Error,
    toml_sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    let wanted = match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => path.display().to_string(),
        figment::Source::Code(_) => INLINE_SOURCE.to_string(),
        _ => return None,
    };
    toml_sources
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(name, content)| (name.as_str(), content.as_str()))
}

fn locate(
    source: Option<(&str, &str)>,
    section: Option<&str>,
    field: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    source
        .and_then(|(name, content)| {
            let offset = find_key_offset(content, section, field)?;
            Some((
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(name, content.to_string())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` within `section` (or the top level) of `content`.
///
/// The search stops at the next table header, so a key of the same name in a
/// later section is never matched. At the top level, a `[field]` header also
/// counts, which is how an unknown section is located.
pub fn find_key_offset(content: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let mut offset = 0;
    let mut current: Option<&str> = None;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if let Some(header) = table_header(trimmed) {
            if section.is_none() && header == field {
                return trimmed.find(header).map(|at| offset + indent + at);
            }
            current = Some(header);
        } else if current == section && assigns(trimmed, field) {
            return Some(offset + indent);
        }
        offset += line.len();
    }

    None
}

fn table_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?;
    let end = inner.find(']')?;
    Some(inner[..end].trim())
}

fn assigns(line: &str, field: &str) -> bool {
    line.strip_prefix(field)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

/// Render each error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PulseConfig;

    #[test]
    fn section_table_matches_model() {
        let mut config = PulseConfig::default();
        config.session.user_id = Some("alice".to_string());
        let value = toml::Value::try_from(&config).unwrap();
        let table = value.as_table().unwrap();

        assert_eq!(table.len(), SECTIONS.len());
        for (section, keys) in SECTIONS {
            let mut actual: Vec<&str> = table[*section]
                .as_table()
                .unwrap()
                .keys()
                .map(String::as_str)
                .collect();
            let mut expected = keys.to_vec();
            actual.sort_unstable();
            expected.sort_unstable();
            assert_eq!(actual, expected, "section [{section}]");
        }
    }

    #[test]
    fn suggest_interval_for_misspelled_key() {
        let valid = &["notification_interval_secs", "conversation_interval_secs"];
        assert_eq!(
            suggest_key("conversation_intervall_secs", valid),
            Some("conversation_interval_secs".to_string())
        );
    }

    #[test]
    fn top_level_section_key_is_misplaced() {
        let error = unknown_field("capacity", None, &[], None);
        assert!(matches!(
            error,
            ConfigError::MisplacedKey { ref section, .. } if section == "feed"
        ));
    }

    #[test]
    fn misspelled_section_suggests_section_name() {
        let error = unknown_field("poling", None, &[], None);
        match error {
            ConfigError::UnknownKey {
                suggestion,
                valid_keys,
                ..
            } => {
                assert_eq!(suggestion.as_deref(), Some("polling"));
                assert!(valid_keys.contains("upload"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn key_offset_stays_inside_its_section() {
        let content = "[push]\nendpoint = \"ws://a\"\n\n[feed]\ncapasity = 10\n";
        assert_eq!(find_key_offset(content, Some("api"), "endpoint"), None);
        let offset = find_key_offset(content, Some("feed"), "capasity").unwrap();
        assert_eq!(&content[offset..offset + 8], "capasity");
    }

    #[test]
    fn key_offset_finds_unknown_section_header() {
        let content = "[session]\nuser_id = \"a\"\r\n[poling]\nconversation_interval_secs = 2\n";
        let offset = find_key_offset(content, None, "poling").unwrap();
        assert_eq!(&content[offset..offset + 6], "poling");
    }

    #[test]
    fn top_level_key_ignores_sections() {
        let content = "[feed]\ncapacity = 10\n";
        assert_eq!(find_key_offset(content, None, "capacity"), None);
        let content = "capacity = 10\n[feed]\n";
        assert_eq!(find_key_offset(content, None, "capacity"), Some(0));
    }

    #[test]
    fn scheme_error_names_accepted_schemes() {
        let error = ConfigError::UnsupportedScheme {
            key: "push.endpoint".to_string(),
            value: "http://x".to_string(),
            expected: "ws:// or wss://".to_string(),
        };
        let help = error.help().unwrap().to_string();
        assert_eq!(help, "use a ws:// or wss:// URL");
    }
}
