// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./hippo.toml` > `~/.config/hippo/hippo.toml` > `/etc/hippo/hippo.toml`
//! with environment variable overrides via `HIPPO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HippoConfig;

const SYSTEM_CONFIG: &str = "/etc/hippo/hippo.toml";
const LOCAL_CONFIG: &str = "hippo.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/hippo/hippo.toml` (system-wide)
/// 3. `~/.config/hippo/hippo.toml` (user XDG config)
/// 4. `./hippo.toml` (local directory)
/// 5. `HIPPO_*` environment variables
pub fn load_config() -> Result<HippoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<HippoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HippoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HippoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HippoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HippoConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Paths of every TOML file the loader consults, highest precedence first.
pub fn config_paths() -> Vec<std::path::PathBuf> {
    let local = std::env::current_dir()
        .map(|d| d.join(LOCAL_CONFIG))
        .unwrap_or_else(|_| LOCAL_CONFIG.into());
    vec![local, user_config_path(), SYSTEM_CONFIG.into()]
}

fn user_config_path() -> std::path::PathBuf {
    dirs::config_dir()
        .map(|d| d.join("hippo/hippo.toml"))
        .unwrap_or_default()
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so that
/// `HIPPO_MEMORY_STM_CAPACITY` maps to `memory.stm_capacity`, not `memory.stm.capacity`.
fn env_provider() -> Env {
    Env::prefixed("HIPPO_").map(|key| {
        let mapped = map_env_key(key.as_str());
        mapped.into()
    })
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ["agent", "memory", "provider"] {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
