// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Clubhouse.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Clubhouse configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClubhouseConfig {
    /// Club identity and logging.
    #[serde(default)]
    pub club: ClubConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tick scheduler and activation sweep settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Session booking limits.
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClubConfig {
    /// Display name of the club, used in logs and CLI output.
    #[serde(default = "default_club_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClubConfig {
    fn default() -> Self {
        Self {
            name: default_club_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_club_name() -> String {
    "clubhouse".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("clubhouse").join("clubhouse.db"))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "clubhouse.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// What the scheduler does with a session that runs past its planned end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OvertimePolicy {
    /// Keep the session running and only flag it as overtime.
    #[default]
    Indicate,
    /// Close the session at its planned end during the next sweep.
    AutoClose,
}

/// Tick scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Period of the display-refresh tick in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How often the reservation activation sweep runs, in seconds.
    #[serde(default = "default_activation_interval_secs")]
    pub activation_interval_secs: u64,

    /// Upper bound for the sweep backoff after storage failures, in seconds.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    #[serde(default)]
    pub overtime_policy: OvertimePolicy,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn activation_interval(&self) -> Duration {
        Duration::from_secs(self.activation_interval_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            activation_interval_secs: default_activation_interval_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            overtime_policy: OvertimePolicy::default(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_activation_interval_secs() -> u64 {
    30
}

fn default_max_backoff_secs() -> u64 {
    300
}

/// Limits applied when opening sessions and booking reservations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Longest planned duration a single session or reservation may have.
    #[serde(default = "default_max_planned_hours")]
    pub max_planned_hours: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_planned_hours: default_max_planned_hours(),
        }
    }
}

fn default_max_planned_hours() -> u32 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overtime_policy_uses_snake_case() {
        let config: SchedulerConfig = toml::from_str("overtime_policy = \"auto_close\"").unwrap();
        assert_eq!(config.overtime_policy, OvertimePolicy::AutoClose);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn unknown_overtime_policy_is_rejected() {
        let result = toml::from_str::<SchedulerConfig>("overtime_policy = \"extend\"");
        assert!(result.is_err());
    }
}
