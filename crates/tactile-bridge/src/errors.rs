//! Supervisor errors.

use std::time::Duration;

use tactile_server::TransportError;
use thiserror::Error;

/// Errors from starting, restarting or stopping the active transport.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `start` was requested while a transport is running.
    #[error("a transport is already running")]
    AlreadyRunning,

    /// The transport failed to start (typically a bind error).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The previous transport did not reach `Stopped` in time.
    #[error("transport did not stop within {0:?}")]
    ShutdownTimedOut(Duration),
}

impl SupervisorError {
    /// Whether this wraps a bind failure.
    pub fn is_bind(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_bind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_errors_pass_through() {
        let err: SupervisorError = TransportError::Bind {
            addr: "127.0.0.1:9001".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        }
        .into();
        assert!(err.is_bind());
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:9001: in use");
    }

    #[test]
    fn display() {
        assert_eq!(
            SupervisorError::AlreadyRunning.to_string(),
            "a transport is already running"
        );
        assert!(!SupervisorError::AlreadyRunning.is_bind());
        assert_eq!(
            SupervisorError::ShutdownTimedOut(Duration::from_secs(5)).to_string(),
            "transport did not stop within 5s"
        );
    }
}
