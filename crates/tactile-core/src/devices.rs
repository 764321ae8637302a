//! Device identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an enumerated haptic device.
///
/// The serial is the stable key used by mappings; the index is whatever the
/// hardware SDK assigned during the enumeration that produced this value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// SDK-assigned device index.
    pub index: u32,
    /// Serial number (stable across enumerations).
    pub serial: String,
    /// Human-readable model name.
    pub model: String,
}

impl DeviceInfo {
    /// Create a new device identity.
    pub fn new(index: u32, serial: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            index,
            serial: serial.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({})", self.index, self.serial, self.model)
    }
}
