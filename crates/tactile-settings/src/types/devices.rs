//! Device backend settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tactile_core::DeviceInfo;

/// Default pulse length used by the pulse test.
pub const DEFAULT_PULSE_TEST_MS: u64 = 500;

/// Device backend settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSettings {
    /// Pulse length for the pulse test command.
    pub pulse_test_ms: u64,
    /// Devices exposed by the simulated backend.
    pub simulated: Vec<DeviceInfo>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            pulse_test_ms: DEFAULT_PULSE_TEST_MS,
            simulated: vec![DeviceInfo::new(99, "T35T-53R1AL", "Test Model 1.0")],
        }
    }
}

impl DeviceSettings {
    /// Pulse test length as a [`Duration`].
    pub fn pulse_test(&self) -> Duration {
        Duration::from_millis(self.pulse_test_ms)
    }
}
