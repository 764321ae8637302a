//! Metric names recorded by the transports.
//!
//! Recorded through the `metrics` facade; without an installed recorder they
//! are no-ops.

/// Malformed messages dropped (counter, labels: transport, reason).
pub const TRANSPORT_DECODE_ERRORS_TOTAL: &str = "transport_decode_errors_total";
/// Events decoded and handed to the sink (counter, labels: transport).
pub const EVENTS_RECEIVED_TOTAL: &str = "events_received_total";
/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket connections refused over the limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_snake_case() {
        for name in [
            TRANSPORT_DECODE_ERRORS_TOTAL,
            EVENTS_RECEIVED_TOTAL,
            WS_CONNECTIONS_TOTAL,
            WS_CONNECTIONS_REJECTED_TOTAL,
            WS_CONNECTIONS_ACTIVE,
        ] {
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'), "{name}");
        }
    }
}
