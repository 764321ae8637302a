//! # tactile-settings
//!
//! Configuration for the tactile bridge.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BridgeSettings::default()`]
//! 2. **User file**: `~/.tactile/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TACTILE_*` overrides (highest priority)
//!
//! After loading, [`check_integrity`] repairs values the bridge cannot run
//! with and reports what it changed. [`SettingsWatcher`] re-loads the file
//! when it changes on disk.

#![deny(unsafe_code)]

pub mod errors;
pub mod integrity;
pub mod loader;
pub mod types;
pub mod watcher;

pub use errors::{Result, SettingsError};
pub use integrity::{IntegrityIssue, check_integrity};
pub use loader::{
    SETTINGS_PATH_ENV, apply_env_overrides, deep_merge, load_settings_file,
    load_settings_from_path, save_settings, settings_path,
};
pub use types::*;
pub use watcher::SettingsWatcher;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = BridgeSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let mut settings = BridgeSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.transport.kind, tactile_core::TransportKind::Osc);
        assert_eq!(settings.transport.osc.port, 9001);
        assert_eq!(settings.transport.websocket.port, 8765);
        assert_eq!(settings.transport.restart_grace_ms, 500);
        assert_eq!(settings.devices.pulse_test_ms, 500);
        assert!(settings.mappings.is_empty());
        assert!(check_integrity(&mut settings).is_empty());
    }
}
