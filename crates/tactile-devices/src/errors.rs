//! Device error types.

use thiserror::Error;

/// Errors from device operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The serial is not among the currently enumerated devices.
    #[error("device not found: {0}")]
    NotFound(String),

    /// The backend reports the device as unplugged.
    #[error("device disconnected: {0}")]
    Disconnected(String),

    /// The backend did not answer within the per-call timeout.
    #[error("device {serial} did not respond within {ms}ms")]
    Timeout {
        /// Device serial.
        serial: String,
        /// Timeout that elapsed.
        ms: u64,
    },

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl DeviceError {
    /// Short category string for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Disconnected(_) => "disconnected",
            Self::Timeout { .. } => "timeout",
            Self::Backend(_) => "backend",
        }
    }
}
