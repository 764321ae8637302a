//! # tactile-server
//!
//! Network transports that feed the bridge.
//!
//! Two interchangeable [`TransportServer`] variants normalize their wire
//! messages into [`InboundEvent`](tactile_core::InboundEvent)s and hand them
//! to a registered [`EventSink`]:
//!
//! - [`OscReceiver`]: connectionless, one OSC packet per UDP datagram
//! - [`WebSocketServer`]: many concurrent clients sending JSON, plain text or
//!   binary OSC frames
//!
//! Both share one [`Lifecycle`] state machine, so `start`/`shutdown` behave
//! the same regardless of variant: `shutdown` is idempotent, callable during
//! `start`, and returns only once every socket is released.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod frames;
pub mod lifecycle;
pub mod metrics;
pub mod osc;
pub mod sink;
pub mod transport;
pub mod udp;
pub mod websocket;

pub use config::{ReceiverConfig, WebSocketConfig};
pub use errors::{DecodeError, TransportError};
pub use lifecycle::Lifecycle;
pub use sink::{ChannelSink, EventSink};
pub use transport::{StatusObserver, TransportServer};
pub use udp::OscReceiver;
pub use websocket::WebSocketServer;
