//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BridgeSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tactile_core::TransportKind;
use tracing::debug;

use crate::errors::Result;
use crate::types::{BridgeSettings, LogLevel, MAX_RESTART_GRACE_MS};

/// Environment variable naming an alternative settings file.
pub const SETTINGS_PATH_ENV: &str = "TACTILE_SETTINGS";

/// Resolve the settings file path.
///
/// `TACTILE_SETTINGS` wins; otherwise `~/.tactile/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(path) = read_env_string(SETTINGS_PATH_ENV) {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tactile").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<BridgeSettings> {
    let mut settings = load_settings_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file, without env overrides.
///
/// This is what gets written back after an integrity repair, so values
/// coming from the environment never end up persisted.
pub fn load_settings_file(path: &Path) -> Result<BridgeSettings> {
    let defaults = serde_json::to_value(BridgeSettings::default())?;

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

/// Write settings as pretty JSON.
///
/// The parent directory is created if needed. The file is written to a
/// sibling temp file first and renamed over the target, so a reader never
/// sees a half-written file.
pub fn save_settings(path: &Path, settings: &BridgeSettings) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut content = serde_json::to_string_pretty(settings)?;
    content.push('\n');

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, content)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    debug!(?path, "settings saved");
    Ok(())
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are warned about and ignored (file/default value kept).
pub fn apply_env_overrides(settings: &mut BridgeSettings) {
    // ── Transport ───────────────────────────────────────────────────
    if let Some(v) = read_env_transport("TACTILE_TRANSPORT") {
        settings.transport.kind = v;
    }
    if let Some(v) = read_env_string("TACTILE_HOST") {
        settings.transport.osc.host.clone_from(&v);
        settings.transport.websocket.host = v;
    }
    if let Some(v) = read_env_u16("TACTILE_OSC_PORT", 1, 65535) {
        settings.transport.osc.port = v;
    }
    if let Some(v) = read_env_u16("TACTILE_WS_PORT", 1, 65535) {
        settings.transport.websocket.port = v;
    }
    if let Some(v) = read_env_u64("TACTILE_RESTART_GRACE_MS", 0, MAX_RESTART_GRACE_MS) {
        settings.transport.restart_grace_ms = v;
    }

    // ── Dispatch ────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("TACTILE_DEVICE_TIMEOUT_MS", 1, 60_000) {
        settings.dispatch.device_timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_log_level("TACTILE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_transport(name: &str) -> Option<TransportKind> {
    let val = std::env::var(name).ok()?;
    let result = TransportKind::parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid transport env var, ignoring");
    }
    result
}

fn read_env_log_level(name: &str) -> Option<LogLevel> {
    let val = std::env::var(name).ok()?;
    let result = LogLevel::parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid log level env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}
