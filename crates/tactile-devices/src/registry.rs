//! The set of currently enumerated devices.
//!
//! [`DeviceRegistry`] owns a snapshot of the devices returned by the last
//! enumeration, keyed by serial. Device calls go through the registry so that
//! unknown serials are rejected before touching the backend and every call is
//! bounded by the per-call timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tactile_core::{DeviceInfo, clamp_intensity};
use tracing::{debug, info, warn};

use crate::backend::HapticBackend;
use crate::errors::DeviceError;

/// Counter: failed device calls, labelled by `kind`.
pub const DEVICE_ERRORS_TOTAL: &str = "device_errors_total";

/// An enumerated device and its last applied intensity.
#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    /// Identity reported by the backend.
    pub info: DeviceInfo,
    /// Last intensity successfully applied (`0.0` after enumeration).
    pub intensity: f32,
}

impl Device {
    fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            intensity: 0.0,
        }
    }
}

/// Registry of enumerated devices.
pub struct DeviceRegistry {
    backend: Arc<dyn HapticBackend>,
    devices: RwLock<HashMap<String, Device>>,
    call_timeout: Duration,
}

impl DeviceRegistry {
    /// Create an empty registry; call [`list_devices`](Self::list_devices)
    /// to populate it.
    pub fn new(backend: Arc<dyn HapticBackend>, call_timeout: Duration) -> Self {
        Self {
            backend,
            devices: RwLock::new(HashMap::new()),
            call_timeout,
        }
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Per-call timeout applied to device commands.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Enumerate devices from the backend and replace the snapshot.
    ///
    /// Devices still present keep their intensity. The result is ordered by
    /// index. No lock is held while the backend enumerates.
    pub async fn list_devices(&self) -> Result<Vec<Device>, DeviceError> {
        let infos = self.backend.enumerate().await?;

        let (added, removed) = {
            let mut devices = self.devices.write();
            let mut next = HashMap::with_capacity(infos.len());
            let mut added = 0usize;
            for info in infos {
                let device = match devices.remove(&info.serial) {
                    Some(previous) => Device {
                        info,
                        intensity: previous.intensity,
                    },
                    None => {
                        added += 1;
                        Device::new(info)
                    }
                };
                let _ = next.insert(device.info.serial.clone(), device);
            }
            let removed = devices.len();
            *devices = next;
            (added, removed)
        };

        let list = self.devices();
        info!(
            backend = self.backend.name(),
            count = list.len(),
            added,
            removed,
            "devices enumerated"
        );
        Ok(list)
    }

    /// The last snapshot, ordered by index. Does not call the backend.
    pub fn devices(&self) -> Vec<Device> {
        let mut list: Vec<Device> = self.devices.read().values().cloned().collect();
        list.sort_by(|a, b| {
            a.info
                .index
                .cmp(&b.info.index)
                .then_with(|| a.info.serial.cmp(&b.info.serial))
        });
        list
    }

    /// Whether `serial` is in the current snapshot.
    pub fn contains(&self, serial: &str) -> bool {
        self.devices.read().contains_key(serial)
    }

    /// Last applied intensity of a device.
    pub fn intensity(&self, serial: &str) -> Option<f32> {
        self.devices.read().get(serial).map(|d| d.intensity)
    }

    /// Number of devices in the snapshot.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Drive a device at `value`, clamped to `[0, 1]`.
    ///
    /// Returns the applied intensity. A device the backend reports as
    /// disconnected is evicted and reported as [`DeviceError::NotFound`].
    pub async fn set_intensity(&self, serial: &str, value: f32) -> Result<f32, DeviceError> {
        let value = clamp_intensity(value);
        let result = self.apply_intensity(serial, value).await;
        if let Err(e) = &result {
            metrics::counter!(DEVICE_ERRORS_TOTAL, "kind" => e.category()).increment(1);
        }
        result
    }

    async fn apply_intensity(&self, serial: &str, value: f32) -> Result<f32, DeviceError> {
        let info = self.lookup(serial)?;

        match tokio::time::timeout(self.call_timeout, self.backend.set_intensity(&info, value))
            .await
        {
            Ok(Ok(())) => {
                if let Some(device) = self.devices.write().get_mut(serial) {
                    device.intensity = value;
                }
                debug!(serial, intensity = value, "intensity applied");
                Ok(value)
            }
            Ok(Err(DeviceError::Disconnected(_))) => {
                self.evict(serial);
                Err(DeviceError::NotFound(serial.to_string()))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Timeout {
                serial: serial.to_string(),
                ms: u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Vibrate a device for `duration` without waiting for it.
    ///
    /// The serial is validated immediately; the actuation runs on a spawned
    /// task and failures there are logged. Must be called from within a tokio
    /// runtime.
    pub fn pulse(&self, serial: &str, duration: Duration) -> Result<(), DeviceError> {
        let info = self.lookup(serial)?;
        let backend = Arc::clone(&self.backend);

        drop(tokio::spawn(async move {
            match backend.pulse(&info, duration).await {
                Ok(()) => debug!(serial = %info.serial, ?duration, "pulse finished"),
                Err(e) => {
                    metrics::counter!(DEVICE_ERRORS_TOTAL, "kind" => e.category()).increment(1);
                    warn!(serial = %info.serial, error = %e, "pulse failed");
                }
            }
        }));
        Ok(())
    }

    fn lookup(&self, serial: &str) -> Result<DeviceInfo, DeviceError> {
        self.devices
            .read()
            .get(serial)
            .map(|d| d.info.clone())
            .ok_or_else(|| DeviceError::NotFound(serial.to_string()))
    }

    fn evict(&self, serial: &str) {
        if self.devices.write().remove(serial).is_some() {
            warn!(serial, "device disconnected, removed from registry");
        }
    }
}
