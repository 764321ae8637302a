//! Transport variants, lifecycle states and status notifications.

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of transport variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Connectionless receiver: OSC messages over UDP datagrams.
    #[default]
    Osc,
    /// Connection-oriented server: WebSocket clients pushing frames.
    #[serde(alias = "ws")]
    WebSocket,
}

impl TransportKind {
    /// Stable lowercase name, used in logs, metrics labels and the CLI.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Osc => "osc",
            Self::WebSocket => "websocket",
        }
    }

    /// Parse a case-insensitive variant name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "osc" | "udp" => Some(Self::Osc),
            "websocket" | "ws" => Some(Self::WebSocket),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a transport instance.
///
/// ```text
/// Stopped -> Starting -> Running -> Stopping -> Stopped
///               |                                  ^
///               +---------- (bind failed) ---------+
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// No resources held.
    #[default]
    Stopped,
    /// Binding the endpoint.
    Starting,
    /// Bound and receiving.
    Running,
    /// Releasing resources.
    Stopping,
}

impl TransportState {
    /// Whether moving from `self` to `next` is a legal lifecycle edge.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running | Self::Stopped)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }

    /// Whether the transport is bound and receiving.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// A transport lifecycle notification, delivered to status observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    /// Which variant changed state.
    pub kind: TransportKind,
    /// The state just entered.
    pub state: TransportState,
    /// Bound address while running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_addr: Option<SocketAddr>,
    /// When the transition happened.
    pub at: DateTime<Utc>,
}

impl StatusChange {
    /// Build a notification stamped with the current time.
    #[must_use]
    pub fn now(kind: TransportKind, state: TransportState, local_addr: Option<SocketAddr>) -> Self {
        Self {
            kind,
            state,
            local_addr,
            at: Utc::now(),
        }
    }
}

impl fmt::Display for StatusChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local_addr {
            Some(addr) => write!(f, "{} {} on {addr}", self.kind, self.state),
            None => write!(f, "{} {}", self.kind, self.state),
        }
    }
}
