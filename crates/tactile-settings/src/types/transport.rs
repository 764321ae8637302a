//! Transport and dispatch settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tactile_core::TransportKind;

/// Default grace interval between stopping and re-starting a transport.
pub const DEFAULT_RESTART_GRACE_MS: u64 = 500;
/// Upper bound accepted for the restart grace interval.
pub const MAX_RESTART_GRACE_MS: u64 = 10_000;
/// Default bound on waiting for a transport to stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
/// Default per-call device timeout.
pub const DEFAULT_DEVICE_TIMEOUT_MS: u64 = 250;
/// Default maximum WebSocket message size in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Transport selection and bind parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Which variant the supervisor starts.
    pub kind: TransportKind,
    /// OSC/UDP receiver endpoint.
    pub osc: EndpointSettings,
    /// WebSocket server endpoint and limits.
    pub websocket: WebSocketSettings,
    /// Wait between stopping an old transport and starting its replacement.
    pub restart_grace_ms: u64,
    /// Bound on waiting for a transport to reach `Stopped`.
    pub shutdown_timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::Osc,
            osc: EndpointSettings::new("127.0.0.1", 9001),
            websocket: WebSocketSettings::default(),
            restart_grace_ms: DEFAULT_RESTART_GRACE_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl TransportSettings {
    /// Grace interval as a [`Duration`].
    pub fn restart_grace(&self) -> Duration {
        Duration::from_millis(self.restart_grace_ms)
    }

    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// `host:port` of the endpoint used by the selected variant.
    pub fn bind_addr(&self) -> String {
        match self.kind {
            TransportKind::Osc => self.osc.bind_addr(),
            TransportKind::WebSocket => self.websocket.bind_addr(),
        }
    }
}

/// A host/port pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// Bind host (IP literal or resolvable name).
    pub host: String,
    /// Bind port; `0` picks an ephemeral port.
    pub port: u16,
}

impl EndpointSettings {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` string accepted by the socket constructors.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self::new("127.0.0.1", 9001)
    }
}

/// WebSocket server settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSocketSettings {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Concurrent clients accepted; further connections are refused.
    pub max_connections: usize,
    /// Largest accepted message in bytes.
    pub max_message_size: usize,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            max_connections: 8,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl WebSocketSettings {
    /// `host:port` string accepted by the socket constructors.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Dispatch tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchSettings {
    /// Bound on each device call made while dispatching.
    pub device_timeout_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            device_timeout_ms: DEFAULT_DEVICE_TIMEOUT_MS,
        }
    }
}

impl DispatchSettings {
    /// Device timeout as a [`Duration`].
    pub fn device_timeout(&self) -> Duration {
        Duration::from_millis(self.device_timeout_ms)
    }
}
