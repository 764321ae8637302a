//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file deserializes with defaults filled in for every missing field.

mod devices;
mod logging;
mod transport;

pub use devices::*;
pub use logging::*;
pub use transport::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current settings schema version.
pub const SETTINGS_VERSION: &str = "1";

/// Root settings type for the bridge.
///
/// ```json
/// {
///   "version": "1",
///   "transport": { "kind": "websocket" },
///   "mappings": { "LHR-1234": { "address": "/avatar/parameters/haptic_chest" } }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Settings schema version.
    pub version: String,
    /// Transport variant and per-variant bind parameters.
    pub transport: TransportSettings,
    /// Dispatch tuning.
    pub dispatch: DispatchSettings,
    /// Device backend settings.
    pub devices: DeviceSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Device serial to protocol address.
    pub mappings: BTreeMap<String, DeviceMapping>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION.to_string(),
            transport: TransportSettings::default(),
            dispatch: DispatchSettings::default(),
            devices: DeviceSettings::default(),
            logging: LoggingSettings::default(),
            mappings: BTreeMap::new(),
        }
    }
}

impl BridgeSettings {
    /// Mapping configured for a device serial.
    pub fn mapping_for(&self, serial: &str) -> Option<&DeviceMapping> {
        self.mappings.get(serial)
    }
}

/// Address mapping for a single device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceMapping {
    /// Protocol address driving this device.
    pub address: String,
    /// Intensity multiplier (`>= 0`); unset means `1.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f32>,
}

impl DeviceMapping {
    /// Create a mapping without a multiplier.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            multiplier: None,
        }
    }

    /// Set the intensity multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Multiplier with the default applied.
    pub fn effective_multiplier(&self) -> f32 {
        self.multiplier.unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_gets_defaults() {
        let settings: BridgeSettings =
            serde_json::from_str(r#"{"transport": {"kind": "ws"}}"#).unwrap();
        assert_eq!(settings.transport.kind, tactile_core::TransportKind::WebSocket);
        assert_eq!(settings.transport.websocket.max_connections, 8);
        assert_eq!(settings.dispatch.device_timeout_ms, 250);
    }

    #[test]
    fn mappings_keyed_by_serial() {
        let settings: BridgeSettings = serde_json::from_str(
            r#"{"mappings": {
                "LHR-1": {"address": "/haptic/chest", "multiplier": 0.5},
                "LHR-2": {"address": "/haptic/back"}
            }}"#,
        )
        .unwrap();
        assert_eq!(settings.mappings.len(), 2);
        let chest = settings.mapping_for("LHR-1").unwrap();
        assert_eq!(chest.address, "/haptic/chest");
        assert!((chest.effective_multiplier() - 0.5).abs() < f32::EPSILON);
        let back = settings.mapping_for("LHR-2").unwrap();
        assert!((back.effective_multiplier() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unset_multiplier_is_not_serialized() {
        let json = serde_json::to_value(DeviceMapping::new("/a")).unwrap();
        assert!(json.get("multiplier").is_none());
        let json = serde_json::to_value(DeviceMapping::new("/a").with_multiplier(2.0)).unwrap();
        assert_eq!(json["multiplier"], 2.0);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(BridgeSettings::default()).unwrap();
        assert!(json["transport"].get("restartGraceMs").is_some());
        assert!(json["dispatch"].get("deviceTimeoutMs").is_some());
        assert!(json["devices"].get("pulseTestMs").is_some());
    }
}
