//! Construction of transport instances from settings.

use std::sync::Arc;

use tactile_core::TransportKind;
use tactile_server::{OscReceiver, ReceiverConfig, TransportServer, WebSocketConfig, WebSocketServer};
use tactile_settings::TransportSettings;

/// Builds a fresh, stopped transport for the configured variant.
pub trait TransportFactory: Send + Sync {
    /// Create an instance; it is not started.
    fn create(&self, settings: &TransportSettings) -> Arc<dyn TransportServer>;
}

/// Factory producing the real OSC and WebSocket servers.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn create(&self, settings: &TransportSettings) -> Arc<dyn TransportServer> {
        match settings.kind {
            TransportKind::Osc => Arc::new(OscReceiver::new(receiver_config(settings))),
            TransportKind::WebSocket => Arc::new(WebSocketServer::new(websocket_config(settings))),
        }
    }
}

/// Receiver config for the OSC variant.
pub fn receiver_config(settings: &TransportSettings) -> ReceiverConfig {
    ReceiverConfig::new(settings.osc.bind_addr())
}

/// Server config for the WebSocket variant.
pub fn websocket_config(settings: &TransportSettings) -> WebSocketConfig {
    WebSocketConfig::new(settings.websocket.bind_addr())
        .with_max_connections(settings.websocket.max_connections)
        .with_max_message_size(settings.websocket.max_message_size)
}

#[cfg(test)]
mod tests {
    use tactile_core::TransportState;
    use tactile_settings::EndpointSettings;

    use super::*;

    #[test]
    fn creates_configured_variant() {
        let mut settings = TransportSettings::default();
        let osc = DefaultTransportFactory.create(&settings);
        assert_eq!(osc.kind(), TransportKind::Osc);
        assert_eq!(osc.state(), TransportState::Stopped);

        settings.kind = TransportKind::WebSocket;
        let ws = DefaultTransportFactory.create(&settings);
        assert_eq!(ws.kind(), TransportKind::WebSocket);
        assert!(ws.local_addr().is_none());
    }

    #[test]
    fn configs_follow_settings() {
        let mut settings = TransportSettings::default();
        settings.osc = EndpointSettings::new("0.0.0.0", 9100);
        settings.websocket.port = 9200;
        settings.websocket.max_connections = 2;
        settings.websocket.max_message_size = 1024;

        assert_eq!(receiver_config(&settings).bind_addr, "0.0.0.0:9100");
        let ws = websocket_config(&settings);
        assert_eq!(ws.bind_addr, "127.0.0.1:9200");
        assert_eq!(ws.max_connections, 2);
        assert_eq!(ws.max_message_size, 1024);
    }
}
