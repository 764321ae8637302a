//! Listener configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the OSC/UDP receiver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// `host:port` to bind (`port` 0 picks an ephemeral port).
    pub bind_addr: String,
}

impl ReceiverConfig {
    /// Bind to `bind_addr`.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self::new("127.0.0.1:9001")
    }
}

/// Configuration for the WebSocket server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// `host:port` to bind.
    pub bind_addr: String,
    /// Maximum concurrent clients.
    pub max_connections: usize,
    /// Max message size in bytes.
    pub max_message_size: usize,
}

impl WebSocketConfig {
    /// Bind to `bind_addr` with default limits.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Self::default()
        }
    }

    /// Set the connection limit.
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the message size limit.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8765".into(),
            max_connections: 8,
            max_message_size: 64 * 1024,
        }
    }
}
