//! # tactile-bridge
//!
//! The runtime bridge between transports and haptic devices.
//!
//! ```text
//! TransportServer ──InboundEvent──> Dispatcher ──AddressMap──> DeviceRegistry
//!        ^
//!        └── Supervisor (start / restart / shutdown, one instance at a time)
//! ```
//!
//! [`Bridge`] owns all of it and is the single surface the agent and its
//! console call into.

#![deny(unsafe_code)]

pub mod address_map;
pub mod bridge;
pub mod dispatcher;
pub mod errors;
pub mod factory;
pub mod metrics;
pub mod supervisor;

pub use address_map::{AddressMap, MappedDevice};
pub use bridge::{Bridge, DeviceView};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use errors::SupervisorError;
pub use factory::{DefaultTransportFactory, TransportFactory};
pub use supervisor::Supervisor;
