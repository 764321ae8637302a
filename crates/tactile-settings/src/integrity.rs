//! Settings integrity check.
//!
//! [`check_integrity`] repairs in place every value the bridge cannot run
//! with and reports one [`IntegrityIssue`] per repair. Startup runs
//! load, check, save, so repaired values are written back to disk.

use std::collections::HashSet;
use std::fmt;

use crate::types::{
    BridgeSettings, DEFAULT_DEVICE_TIMEOUT_MS, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_SHUTDOWN_TIMEOUT_MS, MAX_RESTART_GRACE_MS, SETTINGS_VERSION,
};

/// A repaired settings value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityIssue {
    /// Dotted path of the repaired field.
    pub field: String,
    /// What was wrong and what it was changed to.
    pub message: String,
}

impl IntegrityIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Repair `settings` in place and return what was changed.
pub fn check_integrity(settings: &mut BridgeSettings) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    if settings.version != SETTINGS_VERSION {
        issues.push(IntegrityIssue::new(
            "version",
            format!("updated from {:?} to {SETTINGS_VERSION:?}", settings.version),
        ));
        SETTINGS_VERSION.clone_into(&mut settings.version);
    }

    check_transport(settings, &mut issues);
    check_devices(settings, &mut issues);
    check_mappings(settings, &mut issues);

    for issue in &issues {
        tracing::warn!(field = %issue.field, "{}", issue.message);
    }
    issues
}

fn check_transport(settings: &mut BridgeSettings, issues: &mut Vec<IntegrityIssue>) {
    let transport = &mut settings.transport;

    if transport.restart_grace_ms > MAX_RESTART_GRACE_MS {
        issues.push(IntegrityIssue::new(
            "transport.restartGraceMs",
            format!(
                "{} exceeds the maximum, capped at {MAX_RESTART_GRACE_MS}",
                transport.restart_grace_ms
            ),
        ));
        transport.restart_grace_ms = MAX_RESTART_GRACE_MS;
    }
    if transport.shutdown_timeout_ms == 0 {
        issues.push(IntegrityIssue::new(
            "transport.shutdownTimeoutMs",
            format!("0 is not allowed, reset to {DEFAULT_SHUTDOWN_TIMEOUT_MS}"),
        ));
        transport.shutdown_timeout_ms = DEFAULT_SHUTDOWN_TIMEOUT_MS;
    }
    if transport.websocket.max_connections == 0 {
        issues.push(IntegrityIssue::new(
            "transport.websocket.maxConnections",
            "0 would refuse every client, set to 1",
        ));
        transport.websocket.max_connections = 1;
    }
    if transport.websocket.max_message_size == 0 {
        issues.push(IntegrityIssue::new(
            "transport.websocket.maxMessageSize",
            format!("0 is not allowed, reset to {DEFAULT_MAX_MESSAGE_SIZE}"),
        ));
        transport.websocket.max_message_size = DEFAULT_MAX_MESSAGE_SIZE;
    }
    if settings.dispatch.device_timeout_ms == 0 {
        issues.push(IntegrityIssue::new(
            "dispatch.deviceTimeoutMs",
            format!("0 is not allowed, reset to {DEFAULT_DEVICE_TIMEOUT_MS}"),
        ));
        settings.dispatch.device_timeout_ms = DEFAULT_DEVICE_TIMEOUT_MS;
    }
}

fn check_devices(settings: &mut BridgeSettings, issues: &mut Vec<IntegrityIssue>) {
    let mut seen = HashSet::new();
    settings.devices.simulated.retain(|device| {
        if seen.insert(device.serial.clone()) {
            true
        } else {
            issues.push(IntegrityIssue::new(
                "devices.simulated",
                format!("duplicate serial {:?} removed", device.serial),
            ));
            false
        }
    });
}

fn check_mappings(settings: &mut BridgeSettings, issues: &mut Vec<IntegrityIssue>) {
    settings.mappings.retain(|serial, mapping| {
        if serial.trim().is_empty() {
            issues.push(IntegrityIssue::new(
                "mappings",
                "mapping with an empty serial removed",
            ));
            return false;
        }

        let field = format!("mappings.{serial}");
        let trimmed = mapping.address.trim();
        if trimmed.is_empty() {
            issues.push(IntegrityIssue::new(field, "empty address, mapping removed"));
            return false;
        }
        if trimmed.len() != mapping.address.len() {
            issues.push(IntegrityIssue::new(
                format!("{field}.address"),
                "surrounding whitespace trimmed",
            ));
            mapping.address = trimmed.to_string();
        }

        if let Some(multiplier) = mapping.multiplier {
            if !multiplier.is_finite() || multiplier < 0.0 {
                issues.push(IntegrityIssue::new(
                    format!("{field}.multiplier"),
                    format!("{multiplier} is not a valid multiplier, unset"),
                ));
                mapping.multiplier = None;
            }
        }
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceMapping;
    use tactile_core::DeviceInfo;

    fn fields(issues: &[IntegrityIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.field.as_str()).collect()
    }

    #[test]
    fn defaults_are_clean() {
        let mut settings = BridgeSettings::default();
        assert!(check_integrity(&mut settings).is_empty());
        assert_eq!(settings, BridgeSettings::default());
    }

    #[test]
    fn outdated_version_updated() {
        let mut settings = BridgeSettings {
            version: "0".into(),
            ..BridgeSettings::default()
        };
        let issues = check_integrity(&mut settings);
        assert_eq!(fields(&issues), ["version"]);
        assert_eq!(settings.version, SETTINGS_VERSION);
    }

    #[test]
    fn transport_values_repaired() {
        let mut settings = BridgeSettings::default();
        settings.transport.restart_grace_ms = 60_000;
        settings.transport.shutdown_timeout_ms = 0;
        settings.transport.websocket.max_connections = 0;
        settings.transport.websocket.max_message_size = 0;
        settings.dispatch.device_timeout_ms = 0;

        let issues = check_integrity(&mut settings);
        assert_eq!(issues.len(), 5);
        assert_eq!(settings.transport.restart_grace_ms, MAX_RESTART_GRACE_MS);
        assert_eq!(settings.transport.shutdown_timeout_ms, DEFAULT_SHUTDOWN_TIMEOUT_MS);
        assert_eq!(settings.transport.websocket.max_connections, 1);
        assert_eq!(
            settings.transport.websocket.max_message_size,
            DEFAULT_MAX_MESSAGE_SIZE
        );
        assert_eq!(settings.dispatch.device_timeout_ms, DEFAULT_DEVICE_TIMEOUT_MS);
    }

    #[test]
    fn bad_mappings_removed_or_repaired() {
        let mut settings = BridgeSettings::default();
        let mappings = &mut settings.mappings;
        let _ = mappings.insert(String::new(), DeviceMapping::new("/a"));
        let _ = mappings.insert("blank".into(), DeviceMapping::new("   "));
        let _ = mappings.insert("padded".into(), DeviceMapping::new("  /b "));
        let _ = mappings.insert(
            "negative".into(),
            DeviceMapping::new("/c").with_multiplier(-1.0),
        );
        let _ = mappings.insert(
            "nan".into(),
            DeviceMapping::new("/d").with_multiplier(f32::NAN),
        );
        let _ = mappings.insert("ok".into(), DeviceMapping::new("/e").with_multiplier(0.0));

        let issues = check_integrity(&mut settings);
        assert_eq!(issues.len(), 5);

        let keys: Vec<&str> = settings.mappings.keys().map(String::as_str).collect();
        assert_eq!(keys, ["nan", "negative", "ok", "padded"]);
        assert_eq!(settings.mappings["padded"].address, "/b");
        assert_eq!(settings.mappings["negative"].multiplier, None);
        assert_eq!(settings.mappings["nan"].multiplier, None);
        assert_eq!(settings.mappings["ok"].multiplier, Some(0.0));
    }

    #[test]
    fn duplicate_simulated_serials_dropped() {
        let mut settings = BridgeSettings::default();
        settings.devices.simulated = vec![
            DeviceInfo::new(0, "A", "first"),
            DeviceInfo::new(1, "B", "second"),
            DeviceInfo::new(2, "A", "again"),
        ];

        let issues = check_integrity(&mut settings);
        assert_eq!(fields(&issues), ["devices.simulated"]);
        let models: Vec<&str> = settings
            .devices
            .simulated
            .iter()
            .map(|d| d.model.as_str())
            .collect();
        assert_eq!(models, ["first", "second"]);
    }

    #[test]
    fn second_pass_is_clean() {
        let mut settings = BridgeSettings::default();
        settings.transport.shutdown_timeout_ms = 0;
        let _ = settings
            .mappings
            .insert("x".into(), DeviceMapping::new(" /x"));
        assert!(!check_integrity(&mut settings).is_empty());
        assert!(check_integrity(&mut settings).is_empty());
    }

    #[test]
    fn issue_display() {
        let issue = IntegrityIssue::new("version", "updated");
        assert_eq!(issue.to_string(), "version: updated");
    }
}
