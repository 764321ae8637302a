//! WebSocket client connection state.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tactile_core::ConnectionId;

/// A connected WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Remote address.
    pub peer: SocketAddr,
    /// When the TCP connection was accepted.
    pub connected_at: Instant,
    messages: AtomicU64,
    decode_errors: AtomicU64,
}

impl ClientConnection {
    /// Create a connection record for `peer`.
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            connected_at: Instant::now(),
            messages: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
        }
    }

    /// Count a received data message.
    pub fn record_message(&self) {
        let _ = self.messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a message that failed to decode.
    pub fn record_decode_error(&self) {
        let _ = self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Data messages received.
    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Messages dropped as malformed.
    pub fn decode_error_count(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Connected clients indexed by connection ID.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection unless `max` connections are already registered.
    pub fn try_add(&self, connection: Arc<ClientConnection>, max: usize) -> bool {
        let mut conns = self.connections.write();
        if conns.len() >= max {
            return false;
        }
        let _ = conns.insert(connection.id.clone(), connection);
        true
    }

    /// Remove a connection by ID.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.write().remove(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no client is connected.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Snapshot of the registered connections.
    pub fn all(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.read().values().cloned().collect()
    }
}
