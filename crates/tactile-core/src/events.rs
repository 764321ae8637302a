//! Normalized inbound events.
//!
//! Every transport variant decodes its wire messages into [`InboundEvent`]s.
//! This is the only shape that crosses the boundary between transport
//! decoding and dispatch.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_INTENSITY, MIN_INTENSITY};

/// Clamp an intensity into `[0, 1]`.
///
/// NaN maps to `0.0` so a malformed value can never drive a device.
#[must_use]
pub fn clamp_intensity(value: f32) -> f32 {
    if value.is_nan() {
        MIN_INTENSITY
    } else {
        value.clamp(MIN_INTENSITY, MAX_INTENSITY)
    }
}

/// A decoded `(address, value)` pair.
///
/// Ephemeral: one per decoded wire message, dropped after dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Protocol address, e.g. `/avatar/parameters/haptic_chest`.
    pub address: String,
    /// Intensity in `[0, 1]`.
    pub value: f32,
}

impl InboundEvent {
    /// Create an event, clamping `value` into `[0, 1]`.
    pub fn new(address: impl Into<String>, value: f32) -> Self {
        Self {
            address: address.into(),
            value: clamp_intensity(value),
        }
    }

    /// Create an event from a double-precision value.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(address: impl Into<String>, value: f64) -> Self {
        Self::new(address, value as f32)
    }
}
