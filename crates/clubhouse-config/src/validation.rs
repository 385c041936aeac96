// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde attributes cannot express: non-empty names and
//! paths, positive intervals, known log levels. Each error names the dotted
//! key it concerns so the loader can point at it in the TOML source.

use crate::diagnostic::ConfigError;
use crate::model::ClubhouseConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ClubhouseConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.club.name.trim().is_empty() {
        errors.push(ConfigError::invalid("club.name", "must not be empty"));
    }

    let level = config.club.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::invalid(
            "club.log_level",
            format!(
                "`{}` is not one of {}",
                config.club.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path", "must not be empty"));
    }

    if config.scheduler.tick_interval_ms == 0 {
        errors.push(ConfigError::invalid(
            "scheduler.tick_interval_ms",
            "must be greater than 0",
        ));
    }

    if config.scheduler.activation_interval_secs == 0 {
        errors.push(ConfigError::invalid(
            "scheduler.activation_interval_secs",
            "must be greater than 0",
        ));
    }

    if config.scheduler.max_backoff_secs < config.scheduler.activation_interval_secs {
        errors.push(ConfigError::invalid(
            "scheduler.max_backoff_secs",
            format!(
                "{} must not be below activation_interval_secs ({})",
                config.scheduler.max_backoff_secs, config.scheduler.activation_interval_secs
            ),
        ));
    }

    if config.session.max_planned_hours == 0 {
        errors.push(ConfigError::invalid(
            "session.max_planned_hours",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
