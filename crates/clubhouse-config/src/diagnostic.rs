// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment reports unknown sections, unknown keys, unknown enum values and
//! type mismatches by key path. This module turns them into miette reports
//! that point into the offending `clubhouse.toml`, list what the section
//! accepts, and suggest the closest spelling. Validation errors carry the
//! dotted key they concern so they get the same source label.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a suggestion.
/// Catches `naem` -> `name` and `autoclose` -> `auto_close`.
const SUGGESTION_THRESHOLD: f64 = 0.75;

type Located = (Option<SourceSpan>, Option<NamedSource<String>>);

/// A configuration problem, renderable with source context.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A table that is not one of `[club]`, `[storage]`, `[scheduler]`, `[session]`.
    #[error("unknown section `[{name}]`")]
    #[diagnostic(
        code(clubhouse::config::unknown_section),
        help("{}", did_you_mean(suggestion.as_deref(), "sections", valid))
    )]
    UnknownSection {
        name: String,
        suggestion: Option<String>,
        valid: String,
        #[label("not a clubhouse section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key the section does not define.
    #[error("`{key}` is not a setting of [{section}]")]
    #[diagnostic(
        code(clubhouse::config::unknown_key),
        help("{}", did_you_mean(suggestion.as_deref(), "keys", valid))
    )]
    UnknownKey {
        section: String,
        key: String,
        suggestion: Option<String>,
        valid: String,
        #[label("unknown key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// An enum setting, such as `scheduler.overtime_policy`, set to a value
    /// it does not accept.
    #[error("`{value}` is not a valid value for `{key}`")]
    #[diagnostic(
        code(clubhouse::config::unknown_value),
        help("{}", value_help(key, suggestion.as_deref(), valid))
    )]
    UnknownValue {
        key: String,
        value: String,
        suggestion: Option<String>,
        valid: String,
        #[label("unrecognized value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(clubhouse::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("wrong type")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(clubhouse::config::missing_key),
        help("add `{key} = <value>` to your clubhouse.toml")
    )]
    MissingKey { key: String },

    /// A value that parsed but breaks a constraint, keyed by dotted path
    /// (`scheduler.tick_interval_ms`).
    #[error("invalid `{key}`: {message}")]
    #[diagnostic(code(clubhouse::config::validation))]
    Validation {
        key: String,
        message: String,
        #[label("set here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(clubhouse::config::other))]
    Other(String),
}

impl ConfigError {
    /// A validation failure for `key`, located later by [`locate_validation`].
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
            span: None,
            src: None,
        }
    }
}

fn did_you_mean(suggestion: Option<&str>, noun: &str, valid: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid {noun}: {valid}"),
        None => format!("valid {noun}: {valid}"),
    }
}

fn value_help(key: &str, suggestion: Option<&str>, valid: &str) -> String {
    let base = did_you_mean(suggestion, "values", valid);
    match key.rsplit('.').next() {
        Some("overtime_policy") => format!(
            "{base}\n`indicate` keeps overrunning sessions open and flags them; \
             `auto_close` ends them at their planned end"
        ),
        _ => base,
    }
}

/// Closest entry of `options` to `input` by Jaro-Winkler similarity, if
/// any is similar enough.
pub fn suggest(input: &str, options: &[&str]) -> Option<String> {
    options
        .iter()
        .map(|&option| (strsim::jaro_winkler(input, option), option))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, option)| option.to_string())
}

/// Convert every error inside a `figment::Error` into a [`ConfigError`].
///
/// `sources` holds `(path, content)` for each TOML file that fed the
/// figment, used to attach spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            let origin = origin_path(&error);
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let suggestion = suggest(field, expected);
                    let valid = expected.join(", ");
                    match section_of(&path, field) {
                        None => {
                            let (span, src) =
                                locate(sources, origin.as_deref(), |c| header_span(c, field));
                            ConfigError::UnknownSection {
                                name: field.clone(),
                                suggestion,
                                valid,
                                span,
                                src,
                            }
                        }
                        Some(section) => {
                            let (span, src) = locate(sources, origin.as_deref(), |c| {
                                key_span(c, Some(section), field)
                            });
                            ConfigError::UnknownKey {
                                section: section.to_string(),
                                key: field.clone(),
                                suggestion,
                                valid,
                                span,
                                src,
                            }
                        }
                    }
                }
                Kind::UnknownVariant(value, expected) => {
                    let (span, src) = locate_value(sources, origin.as_deref(), &path);
                    ConfigError::UnknownValue {
                        key: path.join("."),
                        value: value.clone(),
                        suggestion: suggest(value, expected),
                        valid: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) => {
                    let (span, src) = locate_value(sources, origin.as_deref(), &path);
                    ConfigError::InvalidType {
                        key: path.join("."),
                        found: actual.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Attach source spans to [`ConfigError::Validation`] entries whose key is
/// written in one of `sources`. Other errors pass through unchanged.
pub fn locate_validation(
    errors: Vec<ConfigError>,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    errors
        .into_iter()
        .map(|error| match error {
            ConfigError::Validation {
                key,
                message,
                span: None,
                src: None,
            } => {
                let path: Vec<String> = key.split('.').map(str::to_string).collect();
                let (span, src) = locate_key(sources, &path);
                ConfigError::Validation {
                    key,
                    message,
                    span,
                    src,
                }
            }
            other => other,
        })
        .collect()
}

fn origin_path(error: &figment::Error) -> Option<String> {
    match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => Some(path.display().to_string()),
        _ => None,
    }
}

/// The section an unknown field belongs to; `None` for a top-level table.
fn section_of<'a>(path: &'a [String], field: &str) -> Option<&'a str> {
    path.first()
        .map(String::as_str)
        .filter(|&first| first != field)
}

fn split_key(path: &[String]) -> Option<(Option<&str>, &str)> {
    match path {
        [field] => Some((None, field.as_str())),
        [section, field] => Some((Some(section.as_str()), field.as_str())),
        _ => None,
    }
}

fn locate_value(sources: &[(String, String)], origin: Option<&str>, path: &[String]) -> Located {
    match split_key(path) {
        Some((section, field)) => locate(sources, origin, |c| value_span(c, section, field)),
        None => (None, None),
    }
}

fn locate_key(sources: &[(String, String)], path: &[String]) -> Located {
    match split_key(path) {
        Some((section, field)) => locate(sources, None, |c| key_span(c, section, field)),
        None => (None, None),
    }
}

/// First source that `find` can point into, preferring the file figment
/// named as the origin of the error.
fn locate(
    sources: &[(String, String)],
    origin: Option<&str>,
    find: impl Fn(&str) -> Option<SourceSpan>,
) -> Located {
    let preferred = origin.and_then(|o| sources.iter().find(|(path, _)| path == o));
    preferred
        .into_iter()
        .chain(sources.iter())
        .find_map(|(path, content)| {
            find(content).map(|span| (span, NamedSource::new(path, content.clone())))
        })
        .map_or((None, None), |(span, src)| (Some(span), Some(src)))
}

/// Byte offset of the line assigning `field` inside `[section]` (or before
/// any header when `section` is `None`), and that line without indentation.
fn find_assignment<'a>(
    content: &'a str,
    section: Option<&str>,
    field: &str,
) -> Option<(usize, &'a str)> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            current = Some(header.trim());
            continue;
        }
        if current != section {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        if let Some(after) = rest.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some((start + indent, rest));
        }
    }
    None
}

fn key_span(content: &str, section: Option<&str>, field: &str) -> Option<SourceSpan> {
    let (at, _) = find_assignment(content, section, field)?;
    Some(SourceSpan::new(at.into(), field.len()))
}

fn value_span(content: &str, section: Option<&str>, field: &str) -> Option<SourceSpan> {
    let (at, rest) = find_assignment(content, section, field)?;
    let eq = rest.find('=')?;
    let value = &rest[eq + 1..];
    let lead = value.len() - value.trim_start().len();
    Some(SourceSpan::new((at + eq + 1 + lead).into(), value.trim().len()))
}

fn header_span(content: &str, name: &str) -> Option<SourceSpan> {
    let header = format!("[{name}]");
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim() == header {
            let indent = line.len() - line.trim_start().len();
            return Some(SourceSpan::new((offset + indent).into(), header.len()));
        }
        offset += line.len();
    }
    None
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
