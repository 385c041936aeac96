// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./clubhouse.toml` > `~/.config/clubhouse/clubhouse.toml`
//! > `/etc/clubhouse/clubhouse.toml` with environment variable overrides via the
//! `CLUBHOUSE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ClubhouseConfig;

pub(crate) const LOCAL_CONFIG: &str = "clubhouse.toml";
pub(crate) const SYSTEM_CONFIG: &str = "/etc/clubhouse/clubhouse.toml";

/// Path of the per-user config file, if the platform has a config dir.
pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clubhouse").join(LOCAL_CONFIG))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/clubhouse/clubhouse.toml` (system-wide)
/// 3. `~/.config/clubhouse/clubhouse.toml` (user XDG config)
/// 4. `./clubhouse.toml` (local directory)
/// 5. `CLUBHOUSE_*` environment variables
pub fn load_config() -> Result<ClubhouseConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ClubhouseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ClubhouseConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ClubhouseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ClubhouseConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ClubhouseConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `CLUBHOUSE_SCHEDULER_TICK_INTERVAL_MS` must become
/// `scheduler.tick_interval_ms`.
fn env_provider() -> Env {
    Env::prefixed("CLUBHOUSE_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ["club", "storage", "scheduler", "session"] {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
