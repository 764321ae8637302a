//! Hardware SDK boundary.

use std::time::Duration;

use async_trait::async_trait;
use tactile_core::DeviceInfo;

use crate::errors::DeviceError;

/// Access to haptic hardware.
///
/// Implementations report an unplugged device with
/// [`DeviceError::Disconnected`]; the registry evicts it on that signal.
#[async_trait]
pub trait HapticBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Enumerate the devices currently attached.
    async fn enumerate(&self) -> Result<Vec<DeviceInfo>, DeviceError>;

    /// Drive a device at `intensity` (already clamped to `[0, 1]`).
    async fn set_intensity(&self, device: &DeviceInfo, intensity: f32) -> Result<(), DeviceError>;

    /// Vibrate a device for `duration`. May take the full duration.
    async fn pulse(&self, device: &DeviceInfo, duration: Duration) -> Result<(), DeviceError>;
}
