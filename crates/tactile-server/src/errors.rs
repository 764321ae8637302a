//! Transport and wire decoding errors.

use tactile_core::TransportState;
use thiserror::Error;

/// Errors returned by [`TransportServer::start`](crate::TransportServer::start).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be bound (typically already in use).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested `host:port`.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// A concurrent `shutdown()` cancelled the start.
    #[error("start cancelled by shutdown")]
    Cancelled,

    /// `start()` was called on an instance that is not stopped.
    #[error("cannot start transport while {0}")]
    InvalidState(TransportState),

    /// Socket error after binding.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this is a bind failure.
    pub fn is_bind(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }
}

/// A wire message that could not be turned into events.
///
/// Decode errors never leave the listener loops: they are counted, logged at
/// debug level and the message is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Zero-length packet or blank text frame.
    #[error("empty message")]
    Empty,

    /// The packet ended before a complete field.
    #[error("truncated packet while reading {0}")]
    Truncated(&'static str),

    /// An OSC string without terminator or not UTF-8.
    #[error("malformed OSC string")]
    InvalidString,

    /// Address missing or not of the expected form.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    /// The message carries no value.
    #[error("message for {0} has no arguments")]
    MissingArgument(String),

    /// The first argument cannot be read as an intensity.
    #[error("unsupported argument type '{tag}' for {address}")]
    UnsupportedArgument {
        /// Message address.
        address: String,
        /// OSC type tag of the first argument.
        tag: char,
    },

    /// A text value that is not a number or boolean.
    #[error("invalid value {value:?} for {address}")]
    InvalidValue {
        /// Message address.
        address: String,
        /// Raw value text.
        value: String,
    },

    /// Nested bundles deeper than the supported limit.
    #[error("bundle nesting deeper than {0} levels")]
    TooDeep(usize),

    /// Message larger than the configured maximum.
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Received size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A JSON frame that does not match the event shape.
    #[error("invalid JSON frame: {0}")]
    Json(String),

    /// A text frame in none of the accepted forms.
    #[error("unrecognized text frame")]
    InvalidFrame,
}

impl DecodeError {
    /// Short category string for metric labels.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Truncated(_) | Self::InvalidString => "malformed",
            Self::InvalidAddress(_) => "address",
            Self::MissingArgument(_) | Self::UnsupportedArgument { .. } | Self::InvalidValue { .. } => {
                "value"
            }
            Self::TooDeep(_) => "too_deep",
            Self::TooLarge { .. } => "too_large",
            Self::Json(_) | Self::InvalidFrame => "frame",
        }
    }
}
