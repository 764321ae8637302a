//! # tactile-devices
//!
//! Haptic hardware access for the tactile bridge.
//!
//! - [`HapticBackend`]: the hardware SDK boundary
//! - [`DeviceRegistry`]: the current set of enumerated devices, addressed by
//!   serial, with bounded per-call latency
//! - [`SimulatedBackend`]: an in-memory backend used by the agent and tests

#![deny(unsafe_code)]

pub mod backend;
pub mod errors;
pub mod registry;
pub mod simulated;

pub use backend::HapticBackend;
pub use errors::DeviceError;
pub use registry::{Device, DeviceRegistry};
pub use simulated::{BackendCall, DEFAULT_CALL_CAPACITY, SimulatedBackend};
