//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StrandSettings::default()`]
//! 2. If `~/.strand/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `STRAND_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::StrandSettings;

/// Directory holding the settings file and the default database.
pub fn strand_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".strand")
}

/// Resolve the path to the settings file (`~/.strand/settings.json`).
pub fn settings_path() -> PathBuf {
    strand_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<StrandSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<StrandSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<StrandSettings> {
    let defaults = serde_json::to_value(StrandSettings::default())?;
    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `STRAND_*` environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut StrandSettings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Empty strings count as unset; out-of-range numbers are ignored with a
/// warning.
pub fn apply_overrides_with(
    settings: &mut StrandSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Memory scope ────────────────────────────────────────────────
    if let Some(v) = read("STRAND_MEMORY_ID") {
        settings.memory.memory_id = v;
    }
    if let Some(v) = read("STRAND_ACTOR_ID") {
        settings.memory.actor_id = v;
    }
    if let Some(v) = read("STRAND_SESSION_ID") {
        settings.memory.session_id = v;
    }
    if let Some(v) = read("STRAND_BRANCH") {
        settings.memory.branch_name = Some(v);
    }

    // ── Session view ────────────────────────────────────────────────
    if let Some(v) = read("STRAND_PAGE_SIZE") {
        match parse_usize_range(&v, 1, 1000) {
            Some(n) => settings.session.page_size = n,
            None => warn!(key = "STRAND_PAGE_SIZE", value = %v, "invalid usize env var, ignoring"),
        }
    }

    // ── Storage and logging ─────────────────────────────────────────
    if let Some(v) = read("STRAND_DB_PATH") {
        settings.storage.db_path = v;
    }
    if let Some(v) = read("STRAND_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
