//! # tactile-core
//!
//! Foundation types shared by every tactile crate.
//!
//! - **Inbound events**: [`InboundEvent`], the normalized `(address, value)`
//!   pair every transport produces and the dispatcher consumes
//! - **Devices**: [`DeviceInfo`], the identity of an enumerated haptic device
//! - **Transports**: [`TransportKind`], [`TransportState`] and [`StatusChange`]
//! - **IDs**: [`ConnectionId`] for client connections

#![deny(unsafe_code)]

pub mod constants;
pub mod devices;
pub mod events;
pub mod ids;
pub mod transport;

pub use devices::DeviceInfo;
pub use events::{InboundEvent, clamp_intensity};
pub use ids::ConnectionId;
pub use transport::{StatusChange, TransportKind, TransportState};
