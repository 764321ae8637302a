//! The transport server abstraction.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tactile_core::{StatusChange, TransportKind, TransportState};

use crate::errors::TransportError;
use crate::sink::EventSink;

/// Callback invoked on every lifecycle transition.
pub type StatusObserver = Arc<dyn Fn(&StatusChange) + Send + Sync>;

/// A network listener producing [`InboundEvent`](tactile_core::InboundEvent)s.
///
/// Register the sink and observers before calling [`start`](Self::start).
#[async_trait]
pub trait TransportServer: Send + Sync {
    /// Which variant this is.
    fn kind(&self) -> TransportKind;

    /// Current lifecycle state.
    fn state(&self) -> TransportState;

    /// Bound address while running.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Malformed messages dropped since creation.
    fn decode_errors(&self) -> u64;

    /// Set the sink receiving decoded events.
    fn on_event(&self, sink: Arc<dyn EventSink>);

    /// Add an observer of lifecycle transitions.
    fn on_status_change(&self, observer: StatusObserver);

    /// Bind the endpoint and start listening.
    ///
    /// Fails with [`TransportError::Bind`] if the endpoint is unavailable,
    /// leaving the instance `Stopped`.
    async fn start(&self) -> Result<SocketAddr, TransportError>;

    /// Stop listening and release every socket.
    ///
    /// Idempotent; returns once the instance is `Stopped`.
    async fn shutdown(&self);
}
