//! In-memory haptic backend.
//!
//! Devices can be plugged and unplugged at runtime, given artificial latency
//! or made to fail, and recent applied commands are kept for inspection.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tactile_core::DeviceInfo;

use crate::backend::HapticBackend;
use crate::errors::DeviceError;

/// A command the simulated backend applied.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    /// `set_intensity` completed.
    SetIntensity {
        /// Device serial.
        serial: String,
        /// Applied intensity.
        intensity: f32,
    },
    /// `pulse` started.
    Pulse {
        /// Device serial.
        serial: String,
        /// Requested duration.
        duration: Duration,
    },
}

impl BackendCall {
    /// Serial the call targeted.
    pub fn serial(&self) -> &str {
        match self {
            Self::SetIntensity { serial, .. } | Self::Pulse { serial, .. } => serial,
        }
    }
}

/// Calls retained by default; older calls are discarded first.
pub const DEFAULT_CALL_CAPACITY: usize = 1024;

struct State {
    devices: Vec<DeviceInfo>,
    latency: HashMap<String, Duration>,
    failures: HashMap<String, DeviceError>,
    calls: VecDeque<BackendCall>,
    call_capacity: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            latency: HashMap::new(),
            failures: HashMap::new(),
            calls: VecDeque::new(),
            call_capacity: DEFAULT_CALL_CAPACITY,
        }
    }
}

/// Backend that keeps its devices in memory.
#[derive(Default)]
pub struct SimulatedBackend {
    state: Mutex<State>,
}

impl SimulatedBackend {
    /// Create a backend exposing `devices`.
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            state: Mutex::new(State {
                devices,
                ..State::default()
            }),
        }
    }

    /// Keep at most `capacity` recent calls (`0` disables recording).
    #[must_use]
    pub fn with_call_capacity(self, capacity: usize) -> Self {
        {
            let mut state = self.state.lock();
            state.call_capacity = capacity;
            while state.calls.len() > capacity {
                let _ = state.calls.pop_front();
            }
        }
        self
    }

    /// Plug in a device, replacing one with the same serial.
    pub fn add_device(&self, info: DeviceInfo) {
        let mut state = self.state.lock();
        state.devices.retain(|d| d.serial != info.serial);
        state.devices.push(info);
    }

    /// Unplug a device. Subsequent calls for it fail with `Disconnected`.
    pub fn remove_device(&self, serial: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.devices.len();
        state.devices.retain(|d| d.serial != serial);
        state.devices.len() != before
    }

    /// Delay every command sent to `serial`.
    pub fn set_latency(&self, serial: &str, latency: Duration) {
        let _ = self.state.lock().latency.insert(serial.to_string(), latency);
    }

    /// Make every command sent to `serial` fail with `error`.
    pub fn fail_with(&self, serial: &str, error: DeviceError) {
        let _ = self.state.lock().failures.insert(serial.to_string(), error);
    }

    /// Stop failing commands for `serial`.
    pub fn clear_failure(&self, serial: &str) {
        let _ = self.state.lock().failures.remove(serial);
    }

    /// The most recent applied commands, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.iter().cloned().collect()
    }

    /// Intensities applied to `serial`, in order.
    pub fn intensities_for(&self, serial: &str) -> Vec<f32> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetIntensity {
                    serial: s,
                    intensity,
                } if s == serial => Some(*intensity),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Latency for the device, or the configured failure.
    fn prepare(&self, serial: &str) -> Result<Duration, DeviceError> {
        let state = self.state.lock();
        if !state.devices.iter().any(|d| d.serial == serial) {
            return Err(DeviceError::Disconnected(serial.to_string()));
        }
        if let Some(error) = state.failures.get(serial) {
            return Err(error.clone());
        }
        Ok(state.latency.get(serial).copied().unwrap_or_default())
    }

    fn record(&self, call: BackendCall) {
        let mut state = self.state.lock();
        if state.call_capacity == 0 {
            return;
        }
        if state.calls.len() >= state.call_capacity {
            let _ = state.calls.pop_front();
        }
        state.calls.push_back(call);
    }
}

#[async_trait]
impl HapticBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn enumerate(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        Ok(self.state.lock().devices.clone())
    }

    async fn set_intensity(&self, device: &DeviceInfo, intensity: f32) -> Result<(), DeviceError> {
        let latency = self.prepare(&device.serial)?;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.record(BackendCall::SetIntensity {
            serial: device.serial.clone(),
            intensity,
        });
        Ok(())
    }

    async fn pulse(&self, device: &DeviceInfo, duration: Duration) -> Result<(), DeviceError> {
        let latency = self.prepare(&device.serial)?;
        self.record(BackendCall::Pulse {
            serial: device.serial.clone(),
            duration,
        });
        tokio::time::sleep(latency + duration).await;
        Ok(())
    }
}
